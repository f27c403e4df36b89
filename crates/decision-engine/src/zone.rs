use scanner_core::{MetricsSnapshot, SetupGrade, Zone, ZoneResult};

use crate::ThresholdConfig;

/// Zone classification is a tagged outcome: a ticker is either graded into
/// a zone or terminally rejected, never both.
#[derive(Debug, Clone)]
pub enum ZoneCall {
    Eligible(ZoneResult),
    Reject {
        /// Zone band the ticker failed in, when one applies
        zone: Option<Zone>,
        reason: String,
    },
}

impl ZoneCall {
    pub fn is_eligible(&self) -> bool {
        matches!(self, ZoneCall::Eligible(_))
    }
}

/// Grade distance from the 200-DMA into GREEN/YELLOW/RED, applying the
/// hard-reject floor and the optional RED reclaim override.
///
/// Rules evaluate in order; the first match wins:
/// 1. current price at or below the hard floor → reject
/// 2. at or above the green boundary → GREEN / A
/// 3. at or below the red boundary → RED / C; eligible only via reclaim,
///    when the session low pierced the floor and the price re-crossed it
/// 4. otherwise YELLOW / B, optionally requiring a rising 200-DMA
pub fn classify_zone(snapshot: &MetricsSnapshot, cfg: &ThresholdConfig) -> ZoneCall {
    let Some(dist) = snapshot.ma200_dist_pct() else {
        return ZoneCall::Reject {
            zone: None,
            reason: format!("{}: 200-DMA unavailable", snapshot.ticker),
        };
    };
    let low_dist = snapshot.ma200_low_dist_pct().unwrap_or(dist);
    let slope = snapshot.ma200_slope;

    // Rule 1: hard floor on current-price distance only. Where the
    // session low traded does not matter here; a recovered price falls
    // through to the zone bands.
    if dist <= cfg.hard_reject_below_200dma_pct {
        return ZoneCall::Reject {
            zone: Some(Zone::Red),
            reason: format!(
                "Hard reject: {:.2}% below 200-DMA floor ({:.2}%)",
                dist, cfg.hard_reject_below_200dma_pct
            ),
        };
    }

    // Rule 2: GREEN
    if dist >= cfg.dma200_green_pct {
        return ZoneCall::Eligible(ZoneResult {
            zone: Zone::Green,
            grade: SetupGrade::A,
            ma200_dist_pct: dist,
            slope,
            reclaimed: false,
        });
    }

    // Rule 3: RED band above the floor; eligible only via reclaim, which
    // needs the low to have pierced the floor and the price to sit back
    // above it on this tick
    if dist <= cfg.dma200_red_pct {
        if cfg.allow_red_reclaim && low_dist <= cfg.hard_reject_below_200dma_pct {
            return ZoneCall::Eligible(ZoneResult {
                zone: Zone::Red,
                grade: SetupGrade::C,
                ma200_dist_pct: dist,
                slope,
                reclaimed: true,
            });
        }
        return ZoneCall::Reject {
            zone: Some(Zone::Red),
            reason: format!(
                "RED zone: {:.2}% below 200-DMA (boundary {:.2}%)",
                dist, cfg.dma200_red_pct
            ),
        };
    }

    // Rule 4: YELLOW
    if cfg.require_rising_dma200_in_yellow && !slope.map(|s| s.is_rising()).unwrap_or(false) {
        return ZoneCall::Reject {
            zone: Some(Zone::Yellow),
            reason: "YELLOW zone requires rising 200-DMA".to_string(),
        };
    }

    ZoneCall::Eligible(ZoneResult {
        zone: Zone::Yellow,
        grade: SetupGrade::B,
        ma200_dist_pct: dist,
        slope,
        reclaimed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scanner_core::MaSlope;

    fn snapshot(price: f64, low: f64, ma200: f64, slope: Option<MaSlope>) -> MetricsSnapshot {
        MetricsSnapshot {
            ticker: "TEST".to_string(),
            price,
            prev_close: Some(price),
            intraday_low: Some(low),
            extended_hours_low: None,
            vwap: None,
            rsi: None,
            relative_volume: None,
            dollar_volume: None,
            market_cap: None,
            avg_volume: None,
            positive_fcf_or_income: None,
            analyst_rating: None,
            ma200: Some(ma200),
            ma200_slope: slope,
            index_change_pct: None,
            days_since_pullback_start: None,
            name: None,
            sector: None,
            timestamp: Utc::now(),
        }
    }

    fn cfg() -> ThresholdConfig {
        ThresholdConfig::default()
    }

    #[test]
    fn green_zone_grade_a() {
        // 5% above the 200-DMA
        let call = classify_zone(&snapshot(105.0, 104.0, 100.0, Some(MaSlope::Rising)), &cfg());
        match call {
            ZoneCall::Eligible(z) => {
                assert_eq!(z.zone, Zone::Green);
                assert_eq!(z.grade, SetupGrade::A);
                assert!(!z.reclaimed);
            }
            ZoneCall::Reject { reason, .. } => panic!("unexpected reject: {reason}"),
        }
    }

    #[test]
    fn yellow_zone_requires_rising_slope() {
        let snap = snapshot(101.0, 100.5, 100.0, Some(MaSlope::Falling));
        match classify_zone(&snap, &cfg()) {
            ZoneCall::Reject { reason, .. } => {
                assert!(reason.contains("YELLOW"));
                assert!(reason.contains("rising"));
            }
            ZoneCall::Eligible(_) => panic!("falling slope must reject in YELLOW"),
        }

        let snap = snapshot(101.0, 100.5, 100.0, Some(MaSlope::Rising));
        match classify_zone(&snap, &cfg()) {
            ZoneCall::Eligible(z) => {
                assert_eq!(z.zone, Zone::Yellow);
                assert_eq!(z.grade, SetupGrade::B);
            }
            ZoneCall::Reject { reason, .. } => panic!("unexpected reject: {reason}"),
        }
    }

    #[test]
    fn yellow_missing_slope_counts_as_not_rising() {
        let snap = snapshot(101.0, 100.5, 100.0, None);
        assert!(!classify_zone(&snap, &cfg()).is_eligible());
    }

    #[test]
    fn yellow_without_rising_requirement() {
        let mut config = cfg();
        config.require_rising_dma200_in_yellow = false;
        let snap = snapshot(101.0, 100.5, 100.0, Some(MaSlope::Falling));
        assert!(classify_zone(&snap, &config).is_eligible());
    }

    #[test]
    fn red_band_rejects_without_reclaim() {
        // 4% below: inside RED band, above the -8% floor
        let snap = snapshot(96.0, 95.5, 100.0, Some(MaSlope::Rising));
        match classify_zone(&snap, &cfg()) {
            ZoneCall::Reject { reason, .. } => assert!(reason.contains("RED")),
            ZoneCall::Eligible(_) => panic!("RED band must reject without reclaim"),
        }
    }

    #[test]
    fn hard_floor_rejects() {
        // price 10% below the 200-DMA
        let snap = snapshot(90.0, 89.0, 100.0, Some(MaSlope::Rising));
        match classify_zone(&snap, &cfg()) {
            ZoneCall::Reject { reason, .. } => assert!(reason.contains("Hard reject")),
            ZoneCall::Eligible(_) => panic!("floor breach must reject"),
        }
    }

    #[test]
    fn floor_ignores_session_low_when_price_recovers() {
        // Low pierced the -8% floor, but the price trades 3% above the
        // 200-DMA: the floor gates on current price, so this is GREEN
        let snap = snapshot(103.0, 91.0, 100.0, Some(MaSlope::Rising));
        match classify_zone(&snap, &cfg()) {
            ZoneCall::Eligible(z) => {
                assert_eq!(z.zone, Zone::Green);
                assert!(!z.reclaimed);
            }
            ZoneCall::Reject { reason, .. } => panic!("unexpected reject: {reason}"),
        }

        // Same shape recovering only into the YELLOW band follows the
        // YELLOW rules, not the floor
        let snap = snapshot(101.0, 91.0, 100.0, Some(MaSlope::Rising));
        match classify_zone(&snap, &cfg()) {
            ZoneCall::Eligible(z) => assert_eq!(z.zone, Zone::Yellow),
            ZoneCall::Reject { reason, .. } => panic!("unexpected reject: {reason}"),
        }
    }

    #[test]
    fn reclaim_admits_red_when_price_recrosses_floor() {
        let mut config = cfg();
        config.allow_red_reclaim = true;
        // low pierced the -8% floor, price recovered to -5%
        let snap = snapshot(95.0, 91.0, 100.0, Some(MaSlope::Rising));
        match classify_zone(&snap, &config) {
            ZoneCall::Eligible(z) => {
                assert_eq!(z.zone, Zone::Red);
                assert_eq!(z.grade, SetupGrade::C);
                assert!(z.reclaimed);
            }
            ZoneCall::Reject { reason, .. } => panic!("reclaim should admit: {reason}"),
        }

        // Same shape without the flag stays rejected
        config.allow_red_reclaim = false;
        assert!(!classify_zone(&snap, &config).is_eligible());
    }

    #[test]
    fn reclaim_cannot_rescue_price_still_below_floor() {
        let mut config = cfg();
        config.allow_red_reclaim = true;
        let snap = snapshot(90.0, 89.0, 100.0, Some(MaSlope::Rising));
        assert!(!classify_zone(&snap, &config).is_eligible());
    }

    #[test]
    fn missing_ma200_rejects_gracefully() {
        let mut snap = snapshot(101.0, 100.0, 100.0, Some(MaSlope::Rising));
        snap.ma200 = None;
        match classify_zone(&snap, &cfg()) {
            ZoneCall::Reject { reason, .. } => assert!(reason.contains("200-DMA unavailable")),
            ZoneCall::Eligible(_) => panic!("missing MA must reject"),
        }
    }
}
