use std::path::Path;

use serde::Deserialize;

use scanner_core::{MetricsProvider, MetricsSnapshot};

/// One tracked position from the positions file.
#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub entry_price: f64,
    #[serde(default)]
    pub entry_date: String,
    #[serde(default)]
    pub shares: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Informational take-profit hint for a tracked position.
#[derive(Debug, Clone)]
pub struct SellAlert {
    pub ticker: String,
    pub price: f64,
    pub change_pct: Option<f64>,
    pub target_hit: String,
    pub entry_price: f64,
    pub entry_date: String,
    pub notes: Option<String>,
}

/// Parse a positions JSON document, dropping malformed entries instead of
/// failing the whole file.
pub fn parse_positions(raw: &str) -> Vec<Position> {
    let items: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("Positions file is not a JSON array: {e}");
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Position>(item) {
            Ok(mut pos) => {
                pos.ticker = pos.ticker.to_uppercase();
                Some(pos)
            }
            Err(e) => {
                tracing::warn!("Skipping malformed position entry: {e}");
                None
            }
        })
        .collect()
}

fn load_positions(path: &Path) -> Vec<Position> {
    if !path.exists() {
        return Vec::new();
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => parse_positions(&raw),
        Err(e) => {
            tracing::warn!("Failed to read positions file {}: {e}", path.display());
            Vec::new()
        }
    }
}

/// Check one position against descending take-profit levels; the first
/// (deepest) level hit wins.
pub fn check_position(
    position: &Position,
    snapshot: &MetricsSnapshot,
    tp_levels: &[f64],
) -> Option<SellAlert> {
    if position.entry_price <= 0.0 {
        return None;
    }
    let gain = (snapshot.price - position.entry_price) / position.entry_price;
    let level = tp_levels.iter().find(|&&level| gain >= level)?;
    Some(SellAlert {
        ticker: position.ticker.clone(),
        price: snapshot.price,
        change_pct: snapshot.change_pct(),
        target_hit: format!("{:.1}% above entry", level * 100.0),
        entry_price: position.entry_price,
        entry_date: position.entry_date.clone(),
        notes: position.notes.clone(),
    })
}

/// Scan all tracked positions, one alert per position at most.
pub async fn scan_positions(
    provider: &dyn MetricsProvider,
    positions_path: &Path,
    tp_levels: &[f64],
) -> Vec<SellAlert> {
    let mut alerts = Vec::new();
    for position in load_positions(positions_path) {
        let snapshot = match provider.snapshot(&position.ticker).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("Sell scan skipped {}: {e}", position.ticker);
                continue;
            }
        };
        if let Some(alert) = check_position(&position, &snapshot, tp_levels) {
            alerts.push(alert);
        }
    }
    alerts
}

/// Render a sell alert into the message sent to all channels.
pub fn render_sell_alert(alert: &SellAlert) -> String {
    let change = match alert.change_pct {
        Some(c) => format!("{c:.2}%"),
        None => "n/a".to_string(),
    };
    let mut lines = vec![
        format!("*SELL ALERT* {}", alert.ticker),
        format!("Price ${:.2} ({change})", alert.price),
        format!("Hit {}", alert.target_hit),
        format!("Entry {:.2} on {}", alert.entry_price, alert.entry_date),
    ];
    if let Some(notes) = &alert.notes {
        lines.push(notes.clone());
    }
    lines.join("\n")
}
