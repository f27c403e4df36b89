use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use scanner_core::{Candle, MaSlope, MetricsProvider, MetricsSnapshot, ScanError, UniverseProvider};
use technical_indicators::{classify_slope, ma_slope_value, relative_volume, rsi, sma, vwap};

const RSI_PERIOD: usize = 14;
const MA_WINDOW: usize = 200;
const SLOPE_LOOKBACK: usize = 5;

/// One ticker entry in the snapshot file: the snapshot fields plus
/// optional price history the derived indicators can be computed from
/// when the fetcher does not supply them directly.
#[derive(Debug, Deserialize)]
struct TickerRecord {
    #[serde(flatten)]
    snapshot: MetricsSnapshot,
    /// Daily closes, oldest first
    #[serde(default)]
    daily_closes: Vec<f64>,
    /// Today's intraday candles
    #[serde(default)]
    intraday_candles: Vec<Candle>,
}

impl TickerRecord {
    /// Fill indicator fields the record left blank from its history.
    fn into_snapshot(self) -> MetricsSnapshot {
        let mut snap = self.snapshot;
        if snap.rsi.is_none() {
            snap.rsi = rsi(&self.daily_closes, RSI_PERIOD);
        }
        if snap.ma200.is_none() {
            snap.ma200 = sma(&self.daily_closes, MA_WINDOW);
        }
        if snap.ma200_slope.is_none() {
            snap.ma200_slope = ma_slope_value(&self.daily_closes, MA_WINDOW, SLOPE_LOOKBACK)
                .map(|s| classify_slope(s, 1e-9));
        }
        if snap.vwap.is_none() {
            snap.vwap = vwap(&self.intraday_candles);
        }
        if snap.relative_volume.is_none() {
            if let Some(avg) = snap.avg_volume {
                let today: f64 = self.intraday_candles.iter().map(|c| c.volume).sum();
                if today > 0.0 {
                    snap.relative_volume = relative_volume(today, avg);
                }
            }
        }
        snap
    }
}

/// Metrics provider backed by a JSON file of snapshots keyed by ticker.
/// The file is re-read on every call so an external fetcher can refresh
/// it between ticks without restarting the agent.
pub struct SnapshotFileProvider {
    path: PathBuf,
    watchlist: Vec<String>,
}

impl SnapshotFileProvider {
    pub fn new(path: impl Into<PathBuf>, watchlist: Vec<String>) -> Self {
        Self {
            path: path.into(),
            watchlist,
        }
    }

    fn load(&self) -> Result<HashMap<String, TickerRecord>, ScanError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| ScanError::Provider(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ScanError::Provider(format!("{}: {e}", self.path.display())))
    }
}

#[async_trait]
impl MetricsProvider for SnapshotFileProvider {
    async fn snapshot(&self, ticker: &str) -> Result<Option<MetricsSnapshot>, ScanError> {
        Ok(self.load()?.remove(ticker).map(TickerRecord::into_snapshot))
    }
}

#[async_trait]
impl UniverseProvider for SnapshotFileProvider {
    /// Watchlist merged with every ticker present in the snapshot file,
    /// deduplicated, watchlist order first.
    async fn universe(&self) -> Result<Vec<String>, ScanError> {
        let mut tickers = self.watchlist.clone();
        let mut known: Vec<String> = self.load()?.into_keys().collect();
        known.sort();
        for ticker in known {
            if !tickers.contains(&ticker) {
                tickers.push(ticker);
            }
        }
        Ok(tickers)
    }
}

/// The data source the agent runs on, selected at startup.
pub enum AgentProvider {
    File(SnapshotFileProvider),
    Simulated(SimulatedProvider),
}

#[async_trait]
impl MetricsProvider for AgentProvider {
    async fn snapshot(&self, ticker: &str) -> Result<Option<MetricsSnapshot>, ScanError> {
        match self {
            AgentProvider::File(p) => p.snapshot(ticker).await,
            AgentProvider::Simulated(p) => p.snapshot(ticker).await,
        }
    }
}

#[async_trait]
impl UniverseProvider for AgentProvider {
    async fn universe(&self) -> Result<Vec<String>, ScanError> {
        match self {
            AgentProvider::File(p) => p.universe().await,
            AgentProvider::Simulated(p) => p.universe().await,
        }
    }
}

/// Synthetic single-ticker provider for simulate mode.
pub struct SimulatedProvider {
    snapshot: MetricsSnapshot,
}

impl SimulatedProvider {
    /// Build a snapshot that passes every quality gate, so the simulated
    /// dip/RSI/relvol/dist200 values are the only variables under test.
    pub fn new(ticker: &str, dip_pct: f64, rsi: f64, relvol: f64, dist200_pct: f64) -> Self {
        let prev_close = 100.0;
        let low = prev_close * (1.0 + dip_pct / 100.0);
        let price = low;
        Self {
            snapshot: MetricsSnapshot {
                ticker: ticker.to_uppercase(),
                price,
                prev_close: Some(prev_close),
                intraday_low: Some(low),
                extended_hours_low: None,
                vwap: Some(price * 1.002),
                rsi: Some(rsi),
                relative_volume: Some(relvol),
                dollar_volume: Some(5_000_000_000.0),
                market_cap: Some(100_000_000_000.0),
                avg_volume: Some(10_000_000.0),
                positive_fcf_or_income: Some(true),
                analyst_rating: Some("buy".to_string()),
                ma200: Some(price / (1.0 + dist200_pct / 100.0)),
                ma200_slope: Some(MaSlope::Rising),
                index_change_pct: Some(-1.0),
                days_since_pullback_start: Some(1),
                name: Some("Simulated".to_string()),
                sector: Some("Simulation".to_string()),
                timestamp: Utc::now(),
            },
        }
    }

    pub fn ticker(&self) -> &str {
        &self.snapshot.ticker
    }
}

#[async_trait]
impl MetricsProvider for SimulatedProvider {
    async fn snapshot(&self, ticker: &str) -> Result<Option<MetricsSnapshot>, ScanError> {
        if ticker == self.snapshot.ticker {
            Ok(Some(self.snapshot.clone()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl UniverseProvider for SimulatedProvider {
    async fn universe(&self) -> Result<Vec<String>, ScanError> {
        Ok(vec![self.snapshot.ticker.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_snapshot_file_is_empty_not_fatal() {
        let provider =
            SnapshotFileProvider::new("/nonexistent/snapshots.json", vec!["AAPL".to_string()]);
        assert!(provider.snapshot("AAPL").await.unwrap().is_none());
        assert_eq!(provider.universe().await.unwrap(), vec!["AAPL"]);
    }

    #[test]
    fn record_history_fills_missing_indicators() {
        // 210 slowly rising closes give a full 200-DMA window and a
        // computable RSI and slope
        let closes: Vec<f64> = (0..210).map(|i| 100.0 + i as f64 * 0.1).collect();
        let raw = serde_json::json!({
            "ticker": "AAPL",
            "price": 120.0,
            "prev_close": 121.0,
            "intraday_low": null,
            "extended_hours_low": null,
            "vwap": null,
            "rsi": null,
            "relative_volume": null,
            "dollar_volume": null,
            "market_cap": null,
            "avg_volume": 1000.0,
            "positive_fcf_or_income": null,
            "analyst_rating": null,
            "ma200": null,
            "ma200_slope": null,
            "index_change_pct": null,
            "days_since_pullback_start": null,
            "name": null,
            "sector": null,
            "timestamp": "2025-03-14T15:00:00Z",
            "daily_closes": closes,
            "intraday_candles": [
                {"timestamp": "2025-03-14T14:30:00Z", "open": 121.0, "high": 121.5, "low": 120.0, "close": 120.5, "volume": 1500.0},
                {"timestamp": "2025-03-14T14:35:00Z", "open": 120.5, "high": 120.8, "low": 119.8, "close": 120.0, "volume": 500.0}
            ]
        });
        let record: TickerRecord = serde_json::from_value(raw).unwrap();
        let snap = record.into_snapshot();

        assert!(snap.ma200.is_some());
        assert_eq!(snap.ma200_slope, Some(MaSlope::Rising));
        // Monotonic rise pins Wilder RSI at 100
        assert_eq!(snap.rsi, Some(100.0));
        // VWAP = (120.5*1500 + 120.0*500) / 2000
        assert!((snap.vwap.unwrap() - 120.375).abs() < 1e-9);
        // 2000 shares today vs 1000 average
        assert!((snap.relative_volume.unwrap() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn simulated_snapshot_hits_requested_metrics() {
        let provider = SimulatedProvider::new("nvda", -5.0, 30.0, 2.0, 4.0);
        let snap = provider.snapshot("NVDA").await.unwrap().unwrap();
        assert!((snap.intraday_low_pct().unwrap() - -5.0).abs() < 1e-9);
        assert!((snap.ma200_dist_pct().unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(snap.rsi, Some(30.0));
        assert!(provider.snapshot("AAPL").await.unwrap().is_none());
    }
}
