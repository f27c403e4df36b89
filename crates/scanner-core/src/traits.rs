use async_trait::async_trait;

use crate::{MetricsSnapshot, ScanError};

/// Supplies the set of tickers to evaluate each tick
/// (index constituents plus any custom watchlist).
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    async fn universe(&self) -> Result<Vec<String>, ScanError>;
}

/// Supplies one consolidated snapshot per ticker on demand.
/// `Ok(None)` means the ticker has no usable data this tick; callers skip
/// it and continue the scan.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn snapshot(&self, ticker: &str) -> Result<Option<MetricsSnapshot>, ScanError>;
}

/// Delivers a rendered alert to a notification channel.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<(), ScanError>;
}
