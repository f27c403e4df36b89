//! Persisted per-ticker alert memory.
//!
//! The dedupe state machine is the only reader and writer of this store.
//! Entries are scoped to a trading day; a prior day's entry must never
//! suppress the first qualifying alert of a new day.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use scanner_core::Tier;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt state for {0}")]
    CorruptState(String),
}

/// Memory of the most recent emitted alert for one ticker.
/// Overwritten on every emit, never accumulates history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerAlertState {
    pub ticker: String,
    /// Trading day (market timezone) the alert belongs to
    pub day: NaiveDate,
    pub tier: Tier,
    /// Worst dip percentage at the time of the alert
    pub worst_dip_pct: f64,
    pub price: Option<f64>,
    pub alerted_at: DateTime<Utc>,
}

/// Keyed store for alert state, swappable behind this trait so decision
/// logic never touches the backing mechanism.
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// Fetch the state for `ticker` on `day`, if any.
    async fn get(&self, ticker: &str, day: NaiveDate) -> Result<Option<TickerAlertState>, StoreError>;

    /// Write-through a new state, replacing any existing entry for the
    /// same ticker and day.
    async fn put(&self, state: &TickerAlertState) -> Result<(), StoreError>;

    /// Drop entries from days other than `today`.
    async fn prune_stale(&self, today: NaiveDate) -> Result<u64, StoreError>;
}

/// Durable store backed by a sqlite table, reloaded at process start.
pub struct SqliteAlertStore {
    pool: SqlitePool,
}

impl SqliteAlertStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the alert state table.
    pub async fn init_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS dip_alert_state (
                ticker TEXT NOT NULL,
                day TEXT NOT NULL,
                tier INTEGER NOT NULL,
                worst_dip_pct REAL NOT NULL,
                price REAL,
                alerted_at TEXT NOT NULL,
                PRIMARY KEY (ticker, day)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AlertStateStore for SqliteAlertStore {
    async fn get(&self, ticker: &str, day: NaiveDate) -> Result<Option<TickerAlertState>, StoreError> {
        let row: Option<(i64, f64, Option<f64>, String)> = sqlx::query_as(
            "SELECT tier, worst_dip_pct, price, alerted_at
             FROM dip_alert_state WHERE ticker = ? AND day = ?",
        )
        .bind(ticker)
        .bind(day.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some((tier, worst_dip_pct, price, alerted_at)) => {
                let tier =
                    Tier::from_i64(tier).ok_or_else(|| StoreError::CorruptState(ticker.to_string()))?;
                let alerted_at = alerted_at
                    .parse::<DateTime<Utc>>()
                    .map_err(|_| StoreError::CorruptState(ticker.to_string()))?;
                Ok(Some(TickerAlertState {
                    ticker: ticker.to_string(),
                    day,
                    tier,
                    worst_dip_pct,
                    price,
                    alerted_at,
                }))
            }
        }
    }

    async fn put(&self, state: &TickerAlertState) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO dip_alert_state (ticker, day, tier, worst_dip_pct, price, alerted_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(ticker, day) DO UPDATE SET
                tier = excluded.tier,
                worst_dip_pct = excluded.worst_dip_pct,
                price = excluded.price,
                alerted_at = excluded.alerted_at",
        )
        .bind(&state.ticker)
        .bind(state.day.to_string())
        .bind(state.tier.as_i64())
        .bind(state.worst_dip_pct)
        .bind(state.price)
        .bind(state.alerted_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune_stale(&self, today: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM dip_alert_state WHERE day != ?")
            .bind(today.to_string())
            .execute(&self.pool)
            .await?;
        let pruned = result.rows_affected();
        if pruned > 0 {
            tracing::debug!("Pruned {} stale alert state entries", pruned);
        }
        Ok(pruned)
    }
}

/// In-memory store for tests and simulate runs.
#[derive(Default)]
pub struct MemoryAlertStore {
    entries: RwLock<HashMap<(String, NaiveDate), TickerAlertState>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStateStore for MemoryAlertStore {
    async fn get(&self, ticker: &str, day: NaiveDate) -> Result<Option<TickerAlertState>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(ticker.to_string(), day)).cloned())
    }

    async fn put(&self, state: &TickerAlertState) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert((state.ticker.clone(), state.day), state.clone());
        Ok(())
    }

    async fn prune_stale(&self, today: NaiveDate) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(_, day), _| *day == today);
        Ok((before - entries.len()) as u64)
    }
}
