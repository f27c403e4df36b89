use scanner_core::ScanError;
use serde::{Deserialize, Serialize};

/// All thresholds the decision engine runs on. Loaded once per run,
/// validated at load time, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Tier 1 "early fear" dip threshold, percent (negative)
    pub tier1_dip: f64,
    /// Tier 2 "panic" dip threshold, percent (must be more severe than tier1)
    pub tier2_dip: f64,
    pub tier1_min_confirmations: u32,
    pub tier2_min_confirmations: u32,
    pub tier1_rsi_max: f64,
    pub tier2_rsi_max: f64,
    pub tier1_relvol_min: f64,
    pub tier2_relvol_min: f64,

    /// GREEN zone starts at this distance above the 200-DMA, percent
    pub dma200_green_pct: f64,
    /// RED zone starts at this distance below the 200-DMA, percent
    pub dma200_red_pct: f64,
    /// Terminal reject when distance falls to or below this floor
    pub hard_reject_below_200dma_pct: f64,
    pub allow_red_reclaim: bool,
    pub require_rising_dma200_in_yellow: bool,

    /// Minutes an existing alert suppresses repeats without material change
    pub dedupe_cooldown_minutes: i64,
    /// Re-alert when the dip deepens by at least this many percentage points
    pub realert_delta: f64,
    /// Always emit on an otherwise-accepted decision (demos/backtests)
    pub testing_mode: bool,

    // Hard quality minima
    pub market_cap_min: f64,
    pub min_dollar_volume: f64,
    pub avg_volume_min: f64,

    /// Skip the fast-selloff confirmation entirely when false
    pub require_fast_selloff: bool,
    /// Max trading days since pullback start to count as a fast selloff
    pub fast_selloff_max_days: i64,
    /// Broad-market backdrop confirmation passes above this day change
    pub index_backdrop_floor_pct: f64,
    /// "VWAP touch" tolerance: price within this percent above VWAP
    pub vwap_tolerance_pct: f64,
    /// Widen the dip metric with the extended-hours low when closed
    pub after_hours_enabled: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            tier1_dip: -3.5,
            tier2_dip: -5.0,
            tier1_min_confirmations: 3,
            tier2_min_confirmations: 2,
            tier1_rsi_max: 35.0,
            tier2_rsi_max: 40.0,
            tier1_relvol_min: 1.5,
            tier2_relvol_min: 1.2,
            dma200_green_pct: 2.0,
            dma200_red_pct: -2.0,
            hard_reject_below_200dma_pct: -8.0,
            allow_red_reclaim: false,
            require_rising_dma200_in_yellow: true,
            dedupe_cooldown_minutes: 30,
            realert_delta: 1.0,
            testing_mode: false,
            market_cap_min: 20_000_000_000.0,
            min_dollar_volume: 1_000_000_000.0,
            avg_volume_min: 2_000_000.0,
            require_fast_selloff: true,
            fast_selloff_max_days: 3,
            index_backdrop_floor_pct: -2.5,
            vwap_tolerance_pct: 0.5,
            after_hours_enabled: false,
        }
    }
}

impl ThresholdConfig {
    /// Reject impossible threshold orderings at load time so they cannot
    /// silently misclassify later.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.tier1_dip >= 0.0 || self.tier2_dip >= 0.0 {
            return Err(ScanError::InvalidConfig(
                "tier dip thresholds must be negative percentages".to_string(),
            ));
        }
        if self.tier2_dip >= self.tier1_dip {
            return Err(ScanError::InvalidConfig(format!(
                "tier2_dip ({}) must be more severe than tier1_dip ({})",
                self.tier2_dip, self.tier1_dip
            )));
        }
        if self.dma200_green_pct <= self.dma200_red_pct {
            return Err(ScanError::InvalidConfig(format!(
                "dma200_green_pct ({}) must be above dma200_red_pct ({})",
                self.dma200_green_pct, self.dma200_red_pct
            )));
        }
        if self.hard_reject_below_200dma_pct > self.dma200_red_pct {
            return Err(ScanError::InvalidConfig(format!(
                "hard_reject_below_200dma_pct ({}) must not be above dma200_red_pct ({})",
                self.hard_reject_below_200dma_pct, self.dma200_red_pct
            )));
        }
        if self.realert_delta <= 0.0 {
            return Err(ScanError::InvalidConfig(
                "realert_delta must be a positive number of percentage points".to_string(),
            ));
        }
        if self.dedupe_cooldown_minutes < 0 {
            return Err(ScanError::InvalidConfig(
                "dedupe_cooldown_minutes must not be negative".to_string(),
            ));
        }
        if self.tier1_min_confirmations == 0 && self.tier2_min_confirmations == 0 {
            return Err(ScanError::InvalidConfig(
                "at least one tier must require confirmations".to_string(),
            ));
        }
        if self.market_cap_min < 0.0 || self.min_dollar_volume < 0.0 || self.avg_volume_min < 0.0 {
            return Err(ScanError::InvalidConfig(
                "quality minima must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
