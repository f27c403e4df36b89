use scanner_core::{ConfirmationPolicy, DipMetric, GateCombinator, Tier, TierResult};

use crate::ThresholdConfig;

/// Grade dip severity into a tier, most severe first. Returns None when
/// the dip does not reach the tier 1 threshold (no alert, pipeline stops).
/// Tier 2 carries an OR confirmation policy, tier 1 an AND policy.
pub fn classify_tier(dip_pct: f64, metric: DipMetric, cfg: &ThresholdConfig) -> Option<TierResult> {
    if dip_pct <= cfg.tier2_dip {
        return Some(TierResult {
            tier: Tier::Tier2,
            dip_pct,
            metric,
            policy: ConfirmationPolicy {
                min_confirmations: cfg.tier2_min_confirmations,
                rsi_max: cfg.tier2_rsi_max,
                relvol_min: cfg.tier2_relvol_min,
                combinator: GateCombinator::Any,
            },
        });
    }

    if dip_pct <= cfg.tier1_dip {
        return Some(TierResult {
            tier: Tier::Tier1,
            dip_pct,
            metric,
            policy: ConfirmationPolicy {
                min_confirmations: cfg.tier1_min_confirmations,
                rsi_max: cfg.tier1_rsi_max,
                relvol_min: cfg.tier1_relvol_min,
                combinator: GateCombinator::All,
            },
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ThresholdConfig {
        ThresholdConfig::default() // tier1 -3.5, tier2 -5.0
    }

    #[test]
    fn shallow_dip_is_none() {
        assert!(classify_tier(-1.0, DipMetric::IntradayLow, &cfg()).is_none());
        assert!(classify_tier(-3.4, DipMetric::IntradayLow, &cfg()).is_none());
        assert!(classify_tier(2.0, DipMetric::IntradayLow, &cfg()).is_none());
    }

    #[test]
    fn tier1_band() {
        let result = classify_tier(-4.0, DipMetric::IntradayLow, &cfg()).unwrap();
        assert_eq!(result.tier, Tier::Tier1);
        assert_eq!(result.policy.combinator, GateCombinator::All);
        assert_eq!(result.policy.min_confirmations, 3);
        assert_eq!(result.dip_pct, -4.0);
    }

    #[test]
    fn tier2_band() {
        let result = classify_tier(-6.0, DipMetric::RegularSessionLow, &cfg()).unwrap();
        assert_eq!(result.tier, Tier::Tier2);
        assert_eq!(result.policy.combinator, GateCombinator::Any);
        assert_eq!(result.policy.min_confirmations, 2);
        assert_eq!(result.metric, DipMetric::RegularSessionLow);
    }

    #[test]
    fn exact_boundaries_take_the_more_severe_tier() {
        assert_eq!(
            classify_tier(-5.0, DipMetric::IntradayLow, &cfg()).unwrap().tier,
            Tier::Tier2
        );
        assert_eq!(
            classify_tier(-3.5, DipMetric::IntradayLow, &cfg()).unwrap().tier,
            Tier::Tier1
        );
    }

    #[test]
    fn tier_is_monotonic_in_dip_depth() {
        let config = cfg();
        let mut last_rank = 0i32;
        // Sweep from shallow to deep; tier rank must never decrease
        for step in 0..200 {
            let dip = -0.05 * step as f64;
            let rank = match classify_tier(dip, DipMetric::IntradayLow, &config) {
                None => 0,
                Some(t) if t.tier == Tier::Tier1 => 1,
                Some(_) => 2,
            };
            assert!(rank >= last_rank, "tier regressed at dip {dip}");
            last_rank = rank;
        }
        assert_eq!(last_rank, 2);
    }
}
