use anyhow::Result;
use decision_engine::ThresholdConfig;
use std::env;

/// Runtime configuration for the scanning agent. Decision thresholds live
/// in the embedded `ThresholdConfig`; everything else here is loop and
/// delivery plumbing.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub thresholds: ThresholdConfig,

    // Scan loop
    pub scan_interval_seconds: u64,
    pub market_hours_only: bool,
    pub cooldown_minutes_after_open: i64,

    // Universe
    pub watchlist: Vec<String>,
    pub index_ticker: String,

    // Data source (JSON snapshot file; there is no live fetcher)
    pub snapshot_file: String,

    // Sell alerts
    pub enable_sell_alerts: bool,
    pub positions_file: String,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub take_profit_3: f64,

    // Persistence
    pub database_url: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(env::var(key).unwrap_or_else(|_| default.to_string()).parse()?)
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let thresholds = ThresholdConfig {
            tier1_dip: env_parse("TIER1_DIP", "-3.5")?,
            tier2_dip: env_parse("TIER2_DIP", "-5.0")?,
            tier1_min_confirmations: env_parse("TIER1_MIN_CONFIRMATIONS", "3")?,
            tier2_min_confirmations: env_parse("TIER2_MIN_CONFIRMATIONS", "2")?,
            tier1_rsi_max: env_parse("TIER1_RSI_MAX", "35")?,
            tier2_rsi_max: env_parse("TIER2_RSI_MAX", "40")?,
            tier1_relvol_min: env_parse("TIER1_RELVOL_MIN", "1.5")?,
            tier2_relvol_min: env_parse("TIER2_RELVOL_MIN", "1.2")?,
            dma200_green_pct: env_parse("DMA200_GREEN_PCT", "2.0")?,
            dma200_red_pct: env_parse("DMA200_RED_PCT", "-2.0")?,
            hard_reject_below_200dma_pct: env_parse("HARD_REJECT_BELOW_200DMA_PCT", "-8.0")?,
            allow_red_reclaim: env_parse("ALLOW_RED_RECLAIM", "false")?,
            require_rising_dma200_in_yellow: env_parse("REQUIRE_RISING_DMA200_IN_YELLOW", "true")?,
            dedupe_cooldown_minutes: env_parse("DEDUPE_COOLDOWN_MINUTES", "30")?,
            realert_delta: env_parse("REALERT_DELTA", "1.0")?,
            testing_mode: env_parse("TESTING_MODE", "false")?,
            market_cap_min: env_parse("MARKET_CAP_MIN", "20000000000")?,
            min_dollar_volume: env_parse("MIN_DOLLAR_VOLUME", "1000000000")?,
            avg_volume_min: env_parse("AVG_VOLUME_MIN", "2000000")?,
            require_fast_selloff: env_parse("REQUIRE_FAST_SELLOFF", "true")?,
            fast_selloff_max_days: env_parse("FAST_SELLOFF_MAX_DAYS", "3")?,
            index_backdrop_floor_pct: env_parse("INDEX_BACKDROP_FLOOR_PCT", "-2.5")?,
            vwap_tolerance_pct: env_parse("VWAP_TOLERANCE_PCT", "0.5")?,
            after_hours_enabled: env_parse("AFTER_HOURS_ENABLED", "false")?,
        };

        Ok(Self {
            thresholds,
            scan_interval_seconds: env_parse("SCAN_INTERVAL", "300")?,
            market_hours_only: env_parse("MARKET_HOURS_ONLY", "true")?,
            cooldown_minutes_after_open: env_parse("COOLDOWN_MINUTES_AFTER_OPEN", "5")?,
            watchlist: env::var("WATCHLIST")
                .unwrap_or_else(|_| {
                    "AAPL,MSFT,GOOGL,AMZN,NVDA,META,AVGO,TSLA,COST,NFLX".to_string()
                })
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            index_ticker: env::var("INDEX_TICKER").unwrap_or_else(|_| "QQQ".to_string()),
            snapshot_file: env::var("SNAPSHOT_FILE")
                .unwrap_or_else(|_| "data/snapshots.json".to_string()),
            enable_sell_alerts: env_parse("ENABLE_SELL_ALERTS", "false")?,
            positions_file: env::var("POSITIONS_FILE")
                .unwrap_or_else(|_| "data/positions.json".to_string()),
            take_profit_1: env_parse("TAKE_PROFIT_1", "0.05")?,
            take_profit_2: env_parse("TAKE_PROFIT_2", "0.07")?,
            take_profit_3: env_parse("TAKE_PROFIT_3", "0.10")?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:dipwatch.db?mode=rwc".to_string()),
        })
    }

    /// Take-profit levels ordered most ambitious first, so the deepest
    /// target hit is the one reported.
    pub fn take_profit_levels(&self) -> Vec<f64> {
        vec![self.take_profit_3, self.take_profit_2, self.take_profit_1]
    }
}
