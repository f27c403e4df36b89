use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intraday OHLCV candle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Direction of the 200-day moving average over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaSlope {
    Rising,
    Flat,
    Falling,
}

impl MaSlope {
    pub fn is_rising(&self) -> bool {
        matches!(self, MaSlope::Rising)
    }
}

/// One consolidated record per ticker per scan tick.
///
/// Every optional field may legitimately be unavailable from the data
/// provider; consumers must exclude the dependent check rather than fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub ticker: String,
    pub price: f64,
    pub prev_close: Option<f64>,
    pub intraday_low: Option<f64>,
    /// Low including pre/post-market prints, when extended data is on
    pub extended_hours_low: Option<f64>,
    pub vwap: Option<f64>,
    pub rsi: Option<f64>,
    /// Today's volume vs the 20-day average
    pub relative_volume: Option<f64>,
    pub dollar_volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub avg_volume: Option<f64>,
    /// True when free cash flow or net income is positive
    pub positive_fcf_or_income: Option<bool>,
    pub analyst_rating: Option<String>,
    pub ma200: Option<f64>,
    pub ma200_slope: Option<MaSlope>,
    /// Broad-market index (QQQ) day change, for backdrop confirmation
    pub index_change_pct: Option<f64>,
    /// Trading days since the current pullback began
    pub days_since_pullback_start: Option<i64>,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Percent change of current price vs the prior session's close.
    pub fn change_pct(&self) -> Option<f64> {
        let prev = self.prev_close?;
        if prev == 0.0 {
            return None;
        }
        Some((self.price - prev) / prev * 100.0)
    }

    /// Percent drop of the intraday low vs the prior session's close.
    pub fn intraday_low_pct(&self) -> Option<f64> {
        let prev = self.prev_close?;
        let low = self.intraday_low?;
        if prev == 0.0 {
            return None;
        }
        Some((low - prev) / prev * 100.0)
    }

    /// Percent drop of the extended-hours low vs the prior session's close.
    pub fn extended_low_pct(&self) -> Option<f64> {
        let prev = self.prev_close?;
        let low = self.extended_hours_low?;
        if prev == 0.0 {
            return None;
        }
        Some((low - prev) / prev * 100.0)
    }

    /// Distance of current price from the 200-day moving average, in percent.
    pub fn ma200_dist_pct(&self) -> Option<f64> {
        let ma = self.ma200?;
        if ma == 0.0 {
            return None;
        }
        Some((self.price / ma - 1.0) * 100.0)
    }

    /// Distance of the session low from the 200-day moving average, in percent.
    pub fn ma200_low_dist_pct(&self) -> Option<f64> {
        let ma = self.ma200?;
        let low = self.intraday_low?;
        if ma == 0.0 {
            return None;
        }
        Some((low / ma - 1.0) * 100.0)
    }
}

/// Price position relative to the 200-day moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl Zone {
    pub fn name(&self) -> &'static str {
        match self {
            Zone::Green => "GREEN",
            Zone::Yellow => "YELLOW",
            Zone::Red => "RED",
        }
    }
}

/// Letter grade for the setup, derived from the zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupGrade {
    A,
    B,
    C,
}

impl SetupGrade {
    pub fn letter(&self) -> char {
        match self {
            SetupGrade::A => 'A',
            SetupGrade::B => 'B',
            SetupGrade::C => 'C',
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SetupGrade::A => "🟢",
            SetupGrade::B => "🟡",
            SetupGrade::C => "🔴",
        }
    }
}

/// Zone classification for an eligible ticker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneResult {
    pub zone: Zone,
    pub grade: SetupGrade,
    /// Distance to the 200-DMA the zone was derived from
    pub ma200_dist_pct: f64,
    pub slope: Option<MaSlope>,
    /// RED zone admitted via the reclaim override
    pub reclaimed: bool,
}

/// Severity of the dip itself, independent of zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Tier1 = 1,
    Tier2 = 2,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Tier1 => "Tier 1 (EARLY FEAR)",
            Tier::Tier2 => "Tier 2 (PANIC)",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Tier::Tier1 => "⚡️",
            Tier::Tier2 => "🚀",
        }
    }

    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(Tier::Tier1),
            2 => Some(Tier::Tier2),
            _ => None,
        }
    }
}

/// How the RSI / relative-volume gates combine with the confirmation count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateCombinator {
    /// Count AND both gates must hold (Tier 1)
    All,
    /// Count OR either gate suffices (Tier 2)
    Any,
}

/// Confirmation requirements selected for a tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    pub min_confirmations: u32,
    pub rsi_max: f64,
    pub relvol_min: f64,
    pub combinator: GateCombinator,
}

/// Which dip metric the orchestrator selected for this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DipMetric {
    IntradayLow,
    RegularSessionLow,
    MinRegularExtended,
}

impl DipMetric {
    pub fn label(&self) -> &'static str {
        match self {
            DipMetric::IntradayLow => "intraday low",
            DipMetric::RegularSessionLow => "regular session low",
            DipMetric::MinRegularExtended => "min(reg session, extended)",
        }
    }
}

/// Tier classification outcome for a qualifying dip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierResult {
    pub tier: Tier,
    /// The dip percentage the tier was decided on
    pub dip_pct: f64,
    pub metric: DipMetric,
    pub policy: ConfirmationPolicy,
}

/// Scored confirmation signals and the pass/fail verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationResult {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub score: u32,
    /// Minimum count after any zone adjustment
    pub required: u32,
    pub rsi_gate_ok: Option<bool>,
    pub relvol_gate_ok: Option<bool>,
    pub accepted: bool,
}

/// Outcome of the dedupe state machine for an otherwise-accepted decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupeOutcome {
    Emitted { reason: String },
    Suppressed { reason: String },
}

impl DedupeOutcome {
    pub fn is_emit(&self) -> bool {
        matches!(self, DedupeOutcome::Emitted { .. })
    }
}

/// Final per-ticker decision for one scan tick.
///
/// Reasons are accumulated in pipeline order and populated on rejects as
/// well, so a rejected decision is still diagnosable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub ticker: String,
    pub accepted: bool,
    pub zone: Option<ZoneResult>,
    pub tier: Option<TierResult>,
    pub confirmations: Option<ConfirmationResult>,
    pub dedupe: Option<DedupeOutcome>,
    pub reasons: Vec<String>,
    pub snapshot: MetricsSnapshot,
    pub decided_at: DateTime<Utc>,
}
