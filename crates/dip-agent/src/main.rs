use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use chrono_tz::US::Eastern;
use tokio::signal::unix::SignalKind;
use tokio::time;

use alert_store::SqliteAlertStore;
use decision_engine::{DecisionPipeline, ScanAudit};
use notification_service::{render_dip_alert, NotificationConfig, NotificationService};
use scanner_core::{MetricsProvider, UniverseProvider};

mod config;
mod market_hours;
mod providers;
mod sell_alerts;

use config::AgentConfig;
use providers::{AgentProvider, SimulatedProvider, SnapshotFileProvider};

struct CliArgs {
    once: bool,
    test_alert: bool,
    simulate: Option<(String, f64, f64, f64, f64)>,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut parsed = CliArgs {
        once: false,
        test_alert: false,
        simulate: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" => parsed.once = true,
            "--test-alert" => parsed.test_alert = true,
            "--simulate" => {
                let mut field = |name: &str| -> Result<String> {
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("--simulate is missing {name}"))
                };
                let ticker = field("TICKER")?;
                let dip: f64 = field("DIP")?.parse()?;
                let rsi: f64 = field("RSI")?.parse()?;
                let relvol: f64 = field("RELVOL")?.parse()?;
                let dist200: f64 = field("DIST200")?.parse()?;
                parsed.simulate = Some((ticker, dip, rsi, relvol, dist200));
            }
            other => anyhow::bail!(
                "Unknown argument {other} (expected --once, --test-alert, or --simulate TICKER DIP RSI RELVOL DIST200)"
            ),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting Dipwatch alert agent");

    let args = parse_args()?;
    let mut config = AgentConfig::from_env()?;
    if args.simulate.is_some() {
        // Simulated runs must always render their alert
        config.thresholds.testing_mode = true;
    }
    tracing::info!("Configuration loaded");
    tracing::info!(
        "  Tiers: tier1 {}% / tier2 {}%",
        config.thresholds.tier1_dip,
        config.thresholds.tier2_dip
    );
    tracing::info!(
        "  Zones: green >= {}% / red <= {}% / floor {}%",
        config.thresholds.dma200_green_pct,
        config.thresholds.dma200_red_pct,
        config.thresholds.hard_reject_below_200dma_pct
    );
    tracing::info!("  Scan interval: {}s", config.scan_interval_seconds);
    tracing::info!("  Watchlist: {} symbols", config.watchlist.len());

    let notifications = NotificationService::new(&NotificationConfig::from_env());

    if args.test_alert {
        notifications
            .send("Test alert: Dipwatch is connected.")
            .await;
        return Ok(());
    }

    let pool = sqlx::SqlitePool::connect(&config.database_url).await?;
    let store = SqliteAlertStore::new(pool);
    store.init_tables().await?;
    tracing::info!("Alert state store initialized ({})", config.database_url);

    let pipeline = DecisionPipeline::new(config.thresholds.clone(), store)?;

    // One object serves as both universe and metrics source
    let provider = match &args.simulate {
        Some((ticker, dip, rsi, relvol, dist200)) => {
            let sim = SimulatedProvider::new(ticker, *dip, *rsi, *relvol, *dist200);
            tracing::info!("Simulate mode: single synthetic snapshot for {}", sim.ticker());
            AgentProvider::Simulated(sim)
        }
        None => AgentProvider::File(SnapshotFileProvider::new(
            config.snapshot_file.clone(),
            config.watchlist.clone(),
        )),
    };

    if market_hours::is_weekend(Utc::now()) {
        tracing::info!("Weekend detected; scanner idle.");
        if args.once {
            return Ok(());
        }
    }

    let mut interval = time::interval(Duration::from_secs(config.scan_interval_seconds));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();
                let market_open = market_hours::is_market_open(now, config.cooldown_minutes_after_open);
                let skip = config.market_hours_only
                    && !config.thresholds.after_hours_enabled
                    && !market_open;
                if skip && args.simulate.is_none() {
                    tracing::info!("Outside market hours; sleeping.");
                } else if let Err(e) = run_scan(&config, &pipeline, &provider, &notifications, market_open).await {
                    tracing::error!("Scan failed: {e}");
                }
                if args.once {
                    break;
                }
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    tracing::info!("Dipwatch alert agent stopped");
    Ok(())
}

async fn run_scan(
    config: &AgentConfig,
    pipeline: &DecisionPipeline<SqliteAlertStore>,
    provider: &AgentProvider,
    notifications: &NotificationService,
    market_open: bool,
) -> Result<()> {
    let now = Utc::now();
    let day = now.with_timezone(&Eastern).date_naive();
    pipeline.start_of_day(day).await;

    let breadth_line = build_breadth_line(provider, &config.index_ticker).await;
    let mut audit = ScanAudit::default();

    for ticker in provider.universe().await? {
        if ticker == config.index_ticker {
            continue;
        }
        let snapshot = match provider.snapshot(&ticker).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!("{ticker} skipped: no snapshot this tick");
                continue;
            }
            Err(e) => {
                tracing::warn!("{ticker} skipped: {e}");
                continue;
            }
        };

        let decision = pipeline
            .decide(&snapshot, market_open, now, day, &mut audit)
            .await;
        if decision.accepted {
            let message = render_dip_alert(&decision, breadth_line.as_deref());
            notifications.send(&message).await;
            tracing::info!("Alert sent for {}", decision.ticker);
        }
    }
    audit.log_summary();

    if config.enable_sell_alerts {
        let levels = config.take_profit_levels();
        let alerts = sell_alerts::scan_positions(
            provider,
            std::path::Path::new(&config.positions_file),
            &levels,
        )
        .await;
        for alert in alerts {
            notifications.send(&sell_alerts::render_sell_alert(&alert)).await;
            tracing::info!("Sell alert sent for {}", alert.ticker);
        }
    }

    Ok(())
}

/// Day-change context line from the broad-market index, when available.
async fn build_breadth_line(provider: &AgentProvider, index_ticker: &str) -> Option<String> {
    match provider.snapshot(index_ticker).await {
        Ok(Some(snapshot)) => snapshot
            .change_pct()
            .map(|c| format!("{index_ticker} {c:.2}% today")),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Breadth line unavailable: {e}");
            None
        }
    }
}
