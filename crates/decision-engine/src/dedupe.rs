use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use alert_store::{AlertStateStore, TickerAlertState};
use scanner_core::{DedupeOutcome, Tier};

use crate::ThresholdConfig;

/// Result of the dedupe transition, with degradation surfaced so the
/// caller can report it instead of the store failure being swallowed.
#[derive(Debug, Clone)]
pub struct DedupeDecision {
    pub outcome: DedupeOutcome,
    /// The state store could not be read or written; dedupe fell back to
    /// treating the ticker as having no prior state
    pub store_degraded: bool,
}

/// Per-ticker memory of the last fired alert. Owns the alert state store
/// exclusively; nothing else reads or writes it.
pub struct DedupeEngine<S: AlertStateStore> {
    store: S,
    /// Serializes the read-decide-write window so overlapping scans
    /// cannot lose updates
    guard: Mutex<()>,
}

impl<S: AlertStateStore> DedupeEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    /// Drop prior-day entries so they can never suppress today's first alert.
    pub async fn start_of_day(&self, today: NaiveDate) {
        if let Err(e) = self.store.prune_stale(today).await {
            tracing::warn!("Alert state prune failed: {e}");
        }
    }

    /// Decide whether an upstream-accepted decision should actually emit.
    ///
    /// Emits on: testing mode, first alert of the day, strict tier
    /// upgrade, dip deepened by at least `realert_delta`, or cooldown
    /// expiry. Suppresses otherwise. On emit the stored state is
    /// overwritten so it always reflects the most recent emitted alert.
    pub async fn evaluate(
        &self,
        ticker: &str,
        tier: Tier,
        dip_pct: f64,
        price: f64,
        day: NaiveDate,
        now: DateTime<Utc>,
        cfg: &ThresholdConfig,
    ) -> DedupeDecision {
        let _held = self.guard.lock().await;

        let new_state = TickerAlertState {
            ticker: ticker.to_string(),
            day,
            tier,
            worst_dip_pct: dip_pct,
            price: Some(price),
            alerted_at: now,
        };

        if cfg.testing_mode {
            let degraded = self.write_state(&new_state).await;
            return DedupeDecision {
                outcome: DedupeOutcome::Emitted {
                    reason: "testing mode".to_string(),
                },
                store_degraded: degraded,
            };
        }

        let (prior, mut degraded) = match self.store.get(ticker, day).await {
            Ok(prior) => (prior, false),
            Err(e) => {
                // Fail safe: no prior state, but surface the degradation
                tracing::warn!("Alert state read failed for {ticker}: {e}; treating as no prior alert");
                (None, true)
            }
        };

        let outcome = match prior {
            None => {
                degraded |= self.write_state(&new_state).await;
                DedupeOutcome::Emitted {
                    reason: "first alert today".to_string(),
                }
            }
            Some(prior) => {
                if tier > prior.tier {
                    degraded |= self.write_state(&new_state).await;
                    DedupeOutcome::Emitted {
                        reason: format!("tier upgrade {} -> {}", prior.tier.label(), tier.label()),
                    }
                } else if dip_pct <= prior.worst_dip_pct - cfg.realert_delta {
                    degraded |= self.write_state(&new_state).await;
                    DedupeOutcome::Emitted {
                        reason: format!(
                            "dip deepened {:.2}% -> {:.2}% (delta {:.2})",
                            prior.worst_dip_pct, dip_pct, cfg.realert_delta
                        ),
                    }
                } else if now - prior.alerted_at >= Duration::minutes(cfg.dedupe_cooldown_minutes) {
                    degraded |= self.write_state(&new_state).await;
                    DedupeOutcome::Emitted {
                        reason: format!("cooldown expired ({} min)", cfg.dedupe_cooldown_minutes),
                    }
                } else {
                    DedupeOutcome::Suppressed {
                        reason: "cooldown/no material change".to_string(),
                    }
                }
            }
        };

        DedupeDecision {
            outcome,
            store_degraded: degraded,
        }
    }

    /// Returns true when the write failed (degraded).
    async fn write_state(&self, state: &TickerAlertState) -> bool {
        match self.store.put(state).await {
            Ok(()) => false,
            Err(e) => {
                tracing::warn!("Alert state write failed for {}: {e}", state.ticker);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_store::MemoryAlertStore;

    fn cfg() -> ThresholdConfig {
        ThresholdConfig {
            realert_delta: 1.0,
            dedupe_cooldown_minutes: 30,
            ..Default::default()
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[tokio::test]
    async fn first_alert_emits_and_records() {
        let engine = DedupeEngine::new(MemoryAlertStore::new());
        let now = Utc::now();

        let decision = engine
            .evaluate("AAPL", Tier::Tier1, -4.0, 100.0, day(), now, &cfg())
            .await;
        assert!(decision.outcome.is_emit());
        assert!(!decision.store_degraded);

        // Re-running the identical tick must not double-emit
        let decision = engine
            .evaluate("AAPL", Tier::Tier1, -4.0, 100.0, day(), now, &cfg())
            .await;
        assert_eq!(
            decision.outcome,
            DedupeOutcome::Suppressed {
                reason: "cooldown/no material change".to_string()
            }
        );
    }

    #[tokio::test]
    async fn small_deepening_suppressed_big_deepening_emits() {
        let engine = DedupeEngine::new(MemoryAlertStore::new());
        let now = Utc::now();
        let config = cfg();

        engine
            .evaluate("NVDA", Tier::Tier1, -4.0, 100.0, day(), now, &config)
            .await;

        // Deepened 0.5 < realert_delta 1.0
        let decision = engine
            .evaluate("NVDA", Tier::Tier1, -4.5, 99.0, day(), now, &config)
            .await;
        assert!(!decision.outcome.is_emit());

        // Deepened past the delta
        let decision = engine
            .evaluate("NVDA", Tier::Tier1, -5.1, 98.0, day(), now, &config)
            .await;
        assert!(decision.outcome.is_emit());
    }

    #[tokio::test]
    async fn tier_upgrade_overrides_delta() {
        let engine = DedupeEngine::new(MemoryAlertStore::new());
        let now = Utc::now();
        let config = cfg();

        engine
            .evaluate("MSFT", Tier::Tier1, -4.0, 100.0, day(), now, &config)
            .await;

        // Only 0.4 deeper, but tier upgraded
        let decision = engine
            .evaluate("MSFT", Tier::Tier2, -4.4, 99.0, day(), now, &config)
            .await;
        match decision.outcome {
            DedupeOutcome::Emitted { reason } => assert!(reason.contains("tier upgrade")),
            DedupeOutcome::Suppressed { reason } => panic!("suppressed: {reason}"),
        }

        // Downgrade back to tier 1 does not emit
        let decision = engine
            .evaluate("MSFT", Tier::Tier1, -4.4, 99.0, day(), now, &config)
            .await;
        assert!(!decision.outcome.is_emit());
    }

    #[tokio::test]
    async fn improving_dip_never_realerts() {
        let engine = DedupeEngine::new(MemoryAlertStore::new());
        let now = Utc::now();
        let config = cfg();

        engine
            .evaluate("AMD", Tier::Tier1, -5.0, 100.0, day(), now, &config)
            .await;
        let decision = engine
            .evaluate("AMD", Tier::Tier1, -3.8, 101.0, day(), now, &config)
            .await;
        assert!(!decision.outcome.is_emit());
    }

    #[tokio::test]
    async fn cooldown_expiry_emits_fresh_event() {
        let engine = DedupeEngine::new(MemoryAlertStore::new());
        let config = cfg();
        let start = Utc::now();

        engine
            .evaluate("GOOG", Tier::Tier1, -4.0, 100.0, day(), start, &config)
            .await;

        let later = start + Duration::minutes(31);
        let decision = engine
            .evaluate("GOOG", Tier::Tier1, -4.0, 100.0, day(), later, &config)
            .await;
        match decision.outcome {
            DedupeOutcome::Emitted { reason } => assert!(reason.contains("cooldown expired")),
            DedupeOutcome::Suppressed { reason } => panic!("suppressed: {reason}"),
        }
    }

    #[tokio::test]
    async fn testing_mode_always_emits() {
        let engine = DedupeEngine::new(MemoryAlertStore::new());
        let now = Utc::now();
        let config = ThresholdConfig {
            testing_mode: true,
            ..cfg()
        };

        for _ in 0..3 {
            let decision = engine
                .evaluate("TSLA", Tier::Tier1, -4.0, 100.0, day(), now, &config)
                .await;
            assert!(decision.outcome.is_emit());
        }
    }

    #[tokio::test]
    async fn prior_day_state_does_not_suppress() {
        let engine = DedupeEngine::new(MemoryAlertStore::new());
        let now = Utc::now();
        let config = cfg();

        let yesterday = NaiveDate::from_ymd_opt(2025, 3, 13).unwrap();
        engine
            .evaluate("META", Tier::Tier2, -6.0, 100.0, yesterday, now, &config)
            .await;

        let decision = engine
            .evaluate("META", Tier::Tier1, -4.0, 100.0, day(), now, &config)
            .await;
        match decision.outcome {
            DedupeOutcome::Emitted { reason } => assert!(reason.contains("first alert")),
            DedupeOutcome::Suppressed { reason } => panic!("suppressed: {reason}"),
        }
    }
}
