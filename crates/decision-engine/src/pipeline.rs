use chrono::{DateTime, NaiveDate, Utc};

use alert_store::AlertStateStore;
use scanner_core::{Decision, DedupeOutcome, DipMetric, MetricsSnapshot, ScanError, Zone};

use crate::confirmation::{check_quality_gates, score_confirmations};
use crate::dedupe::DedupeEngine;
use crate::tier::classify_tier;
use crate::zone::{classify_zone, ZoneCall};
use crate::ThresholdConfig;

/// Per-scan counters, logged at the end of a tick.
#[derive(Debug, Default, Clone)]
pub struct ScanAudit {
    pub green_pass: u32,
    pub yellow_pass: u32,
    pub yellow_fail: u32,
    pub red_reject: u32,
    pub tier1: u32,
    pub tier2: u32,
    pub quality_reject: u32,
    pub confirmation_fail: u32,
    pub deduped: u32,
    pub emitted: u32,
}

impl ScanAudit {
    pub fn log_summary(&self) {
        tracing::debug!(
            "AUDIT zones green={} yellow={}/{} red_reject={} tiers t1={} t2={} quality_reject={} conf_fail={} deduped={} emitted={}",
            self.green_pass,
            self.yellow_pass,
            self.yellow_fail,
            self.red_reject,
            self.tier1,
            self.tier2,
            self.quality_reject,
            self.confirmation_fail,
            self.deduped,
            self.emitted,
        );
    }
}

/// Sequences the classification stages into one ordered pipeline per
/// ticker, short-circuiting on the first failing stage. Pure over
/// (snapshot, config) except for the dedupe read-decide-write.
pub struct DecisionPipeline<S: AlertStateStore> {
    cfg: ThresholdConfig,
    dedupe: DedupeEngine<S>,
}

impl<S: AlertStateStore> DecisionPipeline<S> {
    pub fn new(cfg: ThresholdConfig, store: S) -> Result<Self, ScanError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            dedupe: DedupeEngine::new(store),
        })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.cfg
    }

    /// Drop stale alert state before the first tick of a trading day.
    pub async fn start_of_day(&self, today: NaiveDate) {
        self.dedupe.start_of_day(today).await;
    }

    /// Run one ticker through tier → zone → quality → confirmations →
    /// dedupe. Returns a decision with ordered reasons on every path.
    pub async fn decide(
        &self,
        snapshot: &MetricsSnapshot,
        market_open: bool,
        now: DateTime<Utc>,
        day: NaiveDate,
        audit: &mut ScanAudit,
    ) -> Decision {
        let cfg = &self.cfg;
        let mut reasons = Vec::new();

        let reject = |reasons: Vec<String>,
                      zone: Option<scanner_core::ZoneResult>,
                      tier: Option<scanner_core::TierResult>,
                      confirmations: Option<scanner_core::ConfirmationResult>,
                      dedupe: Option<DedupeOutcome>| Decision {
            ticker: snapshot.ticker.clone(),
            accepted: false,
            zone,
            tier,
            confirmations,
            dedupe,
            reasons,
            snapshot: snapshot.clone(),
            decided_at: now,
        };

        // Stage 0: dip metric selection (session-dependent)
        let Some((dip_pct, metric)) = select_dip_metric(snapshot, market_open, cfg) else {
            reasons.push("Dip metric unavailable".to_string());
            return reject(reasons, None, None, None, None);
        };

        // Stage 1: tier
        let Some(tier) = classify_tier(dip_pct, metric, cfg) else {
            reasons.push(format!(
                "Dip {:.2}% ({}) above tier thresholds",
                dip_pct,
                metric.label()
            ));
            tracing::debug!("{} skipped: dip {:.2}% above tier thresholds", snapshot.ticker, dip_pct);
            return reject(reasons, None, None, None, None);
        };
        match tier.tier {
            scanner_core::Tier::Tier1 => audit.tier1 += 1,
            scanner_core::Tier::Tier2 => audit.tier2 += 1,
        }
        reasons.push(format!(
            "{}: dip {:.2}% ({})",
            tier.tier.label(),
            dip_pct,
            metric.label()
        ));

        // Stage 2: zone
        let zone = match classify_zone(snapshot, cfg) {
            ZoneCall::Eligible(zone) => {
                match zone.zone {
                    Zone::Green => audit.green_pass += 1,
                    Zone::Yellow => audit.yellow_pass += 1,
                    Zone::Red => {}
                }
                reasons.push(format!(
                    "Zone {} (grade {}, {:+.2}% vs 200-DMA{})",
                    zone.zone.name(),
                    zone.grade.letter(),
                    zone.ma200_dist_pct,
                    if zone.reclaimed { ", reclaimed" } else { "" }
                ));
                zone
            }
            ZoneCall::Reject { zone, reason } => {
                match zone {
                    Some(Zone::Yellow) => audit.yellow_fail += 1,
                    Some(Zone::Red) => audit.red_reject += 1,
                    _ => {}
                }
                tracing::debug!("{} zone reject: {}", snapshot.ticker, reason);
                reasons.push(reason);
                return reject(reasons, None, Some(tier), None, None);
            }
        };

        // Stage 3: hard quality gates
        if let Err(reason) = check_quality_gates(snapshot, cfg) {
            audit.quality_reject += 1;
            tracing::debug!("{} quality reject: {}", snapshot.ticker, reason);
            reasons.push(reason);
            return reject(reasons, Some(zone), Some(tier), None, None);
        }
        reasons.push("Quality gates passed".to_string());

        // Stage 4: scored confirmations
        let confirmations = score_confirmations(snapshot, &zone, &tier, cfg);
        if confirmations.accepted {
            reasons.push(format!(
                "Confirmations {}/{}: {}",
                confirmations.score,
                confirmations.required,
                confirmations.passed.join(" • ")
            ));
        } else {
            audit.confirmation_fail += 1;
            tracing::debug!(
                "{} skipped: {} confirmations (need {}) zone={} tier={}",
                snapshot.ticker,
                confirmations.score,
                confirmations.required,
                zone.zone.name(),
                tier.tier.label(),
            );
            reasons.push(format!(
                "Confirmations {}/{} insufficient: failed {}",
                confirmations.score,
                confirmations.required,
                confirmations.failed.join(" • ")
            ));
            return reject(reasons, Some(zone), Some(tier), Some(confirmations), None);
        }

        // Stage 5: dedupe
        let dedupe = self
            .dedupe
            .evaluate(&snapshot.ticker, tier.tier, dip_pct, snapshot.price, day, now, cfg)
            .await;
        if dedupe.store_degraded {
            reasons.push("State store degraded; dedupe ran without durable state".to_string());
        }

        let accepted = dedupe.outcome.is_emit();
        match &dedupe.outcome {
            DedupeOutcome::Emitted { reason } => {
                audit.emitted += 1;
                reasons.push(format!("Emitted: {reason}"));
            }
            DedupeOutcome::Suppressed { reason } => {
                audit.deduped += 1;
                tracing::debug!("{} deduped: {}", snapshot.ticker, reason);
                reasons.push(format!("Suppressed: {reason}"));
            }
        }

        Decision {
            ticker: snapshot.ticker.clone(),
            accepted,
            zone: Some(zone),
            tier: Some(tier),
            confirmations: Some(confirmations),
            dedupe: Some(dedupe.outcome),
            reasons,
            snapshot: snapshot.clone(),
            decided_at: now,
        }
    }
}

/// Pick the dip metric for this tick. During market hours the regular
/// intraday low vs prior close; when closed, optionally widened to the
/// extended-hours low.
fn select_dip_metric(
    snapshot: &MetricsSnapshot,
    market_open: bool,
    cfg: &ThresholdConfig,
) -> Option<(f64, DipMetric)> {
    let regular = snapshot.intraday_low_pct().or_else(|| snapshot.change_pct());

    if market_open {
        return regular.map(|d| (d, DipMetric::IntradayLow));
    }

    if cfg.after_hours_enabled {
        match (regular, snapshot.extended_low_pct()) {
            (Some(reg), Some(ext)) => return Some((reg.min(ext), DipMetric::MinRegularExtended)),
            (None, Some(ext)) => return Some((ext, DipMetric::MinRegularExtended)),
            (reg, None) => return reg.map(|d| (d, DipMetric::RegularSessionLow)),
        }
    }

    regular.map(|d| (d, DipMetric::RegularSessionLow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_store::MemoryAlertStore;
    use chrono::Duration;
    use scanner_core::{MaSlope, Tier};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn cfg() -> ThresholdConfig {
        ThresholdConfig {
            tier1_dip: -3.5,
            tier2_dip: -5.0,
            realert_delta: 1.0,
            ..Default::default()
        }
    }

    fn pipeline(cfg: ThresholdConfig) -> DecisionPipeline<MemoryAlertStore> {
        DecisionPipeline::new(cfg, MemoryAlertStore::new()).unwrap()
    }

    /// Quality name in a clear GREEN uptrend with strong confirmations.
    fn snapshot(dip_pct: f64) -> MetricsSnapshot {
        let prev_close = 100.0;
        let low = prev_close * (1.0 + dip_pct / 100.0);
        let price = low + 0.3;
        MetricsSnapshot {
            ticker: "AAPL".to_string(),
            price,
            prev_close: Some(prev_close),
            intraday_low: Some(low),
            extended_hours_low: None,
            vwap: Some(price + 1.0),
            rsi: Some(30.0),
            relative_volume: Some(2.0),
            dollar_volume: Some(3_000_000_000.0),
            market_cap: Some(50_000_000_000.0),
            avg_volume: Some(10_000_000.0),
            positive_fcf_or_income: Some(true),
            analyst_rating: Some("buy".to_string()),
            ma200: Some(88.0),
            ma200_slope: Some(MaSlope::Rising),
            index_change_pct: Some(-1.2),
            days_since_pullback_start: Some(2),
            name: Some("Apple Inc".to_string()),
            sector: Some("Technology".to_string()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tier1_green_with_confirmations_accepts() {
        let pipe = pipeline(cfg());
        let mut audit = ScanAudit::default();

        let decision = pipe
            .decide(&snapshot(-4.0), true, Utc::now(), day(), &mut audit)
            .await;
        assert!(decision.accepted);
        assert_eq!(decision.tier.as_ref().unwrap().tier, Tier::Tier1);
        assert_eq!(decision.zone.as_ref().unwrap().zone, Zone::Green);
        assert_eq!(audit.tier1, 1);
        assert_eq!(audit.green_pass, 1);
        assert_eq!(audit.emitted, 1);
        assert!(decision.reasons.iter().any(|r| r.contains("EARLY FEAR")));
    }

    #[tokio::test]
    async fn tier2_accepts_via_rsi_or_gate() {
        let pipe = pipeline(cfg());
        let mut audit = ScanAudit::default();

        // relvol misses the tier2 gate, RSI 25 <= 40 carries the OR
        let mut snap = snapshot(-6.0);
        snap.rsi = Some(25.0);
        snap.relative_volume = Some(1.0);

        let decision = pipe.decide(&snap, true, Utc::now(), day(), &mut audit).await;
        assert!(decision.accepted);
        assert_eq!(decision.tier.as_ref().unwrap().tier, Tier::Tier2);
    }

    #[tokio::test]
    async fn shallow_dip_stops_with_reason() {
        let pipe = pipeline(cfg());
        let mut audit = ScanAudit::default();

        let decision = pipe
            .decide(&snapshot(-1.0), true, Utc::now(), day(), &mut audit)
            .await;
        assert!(!decision.accepted);
        assert!(decision.tier.is_none());
        assert!(decision.reasons.iter().any(|r| r.contains("above tier thresholds")));
    }

    #[tokio::test]
    async fn yellow_falling_slope_rejects_regardless_of_confirmations() {
        let pipe = pipeline(cfg());
        let mut audit = ScanAudit::default();

        let mut snap = snapshot(-4.0);
        snap.ma200 = Some(snap.price / 1.01); // ~1% above the 200-DMA
        snap.ma200_slope = Some(MaSlope::Falling);

        let decision = pipe.decide(&snap, true, Utc::now(), day(), &mut audit).await;
        assert!(!decision.accepted);
        assert!(decision.zone.is_none());
        assert!(decision
            .reasons
            .iter()
            .any(|r| r.contains("YELLOW") && r.contains("rising")));
        assert_eq!(audit.yellow_fail, 1);
    }

    #[tokio::test]
    async fn quality_gate_reject_is_terminal_with_reason() {
        let pipe = pipeline(cfg());
        let mut audit = ScanAudit::default();

        let mut snap = snapshot(-4.0);
        snap.market_cap = Some(500_000_000.0);

        let decision = pipe.decide(&snap, true, Utc::now(), day(), &mut audit).await;
        assert!(!decision.accepted);
        assert!(decision.confirmations.is_none());
        assert!(decision.reasons.iter().any(|r| r.contains("Market cap")));
        assert_eq!(audit.quality_reject, 1);
    }

    #[tokio::test]
    async fn realert_requires_delta_or_tier_upgrade() {
        let pipe = pipeline(cfg());
        let mut audit = ScanAudit::default();
        let start = Utc::now();

        // First alert at -4.0
        let decision = pipe
            .decide(&snapshot(-4.0), true, start, day(), &mut audit)
            .await;
        assert!(decision.accepted);

        // -4.5 is only 0.5 deeper: suppressed
        let decision = pipe
            .decide(&snapshot(-4.5), true, start + Duration::minutes(5), day(), &mut audit)
            .await;
        assert!(!decision.accepted);
        assert!(matches!(
            decision.dedupe,
            Some(DedupeOutcome::Suppressed { .. })
        ));

        // -5.2 upgrades to tier 2: emitted despite the cooldown
        let decision = pipe
            .decide(&snapshot(-5.2), true, start + Duration::minutes(10), day(), &mut audit)
            .await;
        assert!(decision.accepted);
        assert_eq!(decision.tier.as_ref().unwrap().tier, Tier::Tier2);
        assert!(decision
            .reasons
            .iter()
            .any(|r| r.contains("tier upgrade")));
    }

    #[tokio::test]
    async fn testing_mode_emits_every_tick() {
        let mut config = cfg();
        config.testing_mode = true;
        let pipe = pipeline(config);
        let mut audit = ScanAudit::default();
        let now = Utc::now();

        for _ in 0..2 {
            let decision = pipe.decide(&snapshot(-4.0), true, now, day(), &mut audit).await;
            assert!(decision.accepted);
        }
        assert_eq!(audit.emitted, 2);
    }

    #[tokio::test]
    async fn closed_market_widens_to_extended_low() {
        let mut config = cfg();
        config.after_hours_enabled = true;
        let pipe = pipeline(config);
        let mut audit = ScanAudit::default();

        // Regular session only dipped -2%, but after-hours took it to -6%
        let mut snap = snapshot(-2.0);
        snap.extended_hours_low = Some(94.0);

        let decision = pipe.decide(&snap, false, Utc::now(), day(), &mut audit).await;
        let tier = decision.tier.as_ref().expect("extended low should reach tier 2");
        assert_eq!(tier.tier, Tier::Tier2);
        assert_eq!(tier.metric, DipMetric::MinRegularExtended);
    }

    #[tokio::test]
    async fn missing_dip_inputs_reject_gracefully() {
        let pipe = pipeline(cfg());
        let mut audit = ScanAudit::default();

        let mut snap = snapshot(-4.0);
        snap.prev_close = None;

        let decision = pipe.decide(&snap, true, Utc::now(), day(), &mut audit).await;
        assert!(!decision.accepted);
        assert!(decision.reasons.iter().any(|r| r.contains("unavailable")));
    }

    #[test]
    fn invalid_config_refused_at_construction() {
        let config = ThresholdConfig {
            tier1_dip: -5.0,
            tier2_dip: -3.5,
            ..Default::default()
        };
        assert!(DecisionPipeline::new(config, MemoryAlertStore::new()).is_err());
    }
}
