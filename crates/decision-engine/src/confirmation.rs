use scanner_core::{ConfirmationResult, GateCombinator, MetricsSnapshot, TierResult, Zone, ZoneResult};

use crate::ThresholdConfig;

/// Hard eligibility gates, checked once before confirmations are scored.
/// The first failing gate is a terminal reject with its own reason,
/// independent of tier and zone. Missing mandatory quality fields make
/// the ticker ineligible for this tick.
pub fn check_quality_gates(snapshot: &MetricsSnapshot, cfg: &ThresholdConfig) -> Result<(), String> {
    match snapshot.market_cap {
        None => return Err("Market cap unavailable".to_string()),
        Some(mcap) if mcap < cfg.market_cap_min => {
            return Err(format!(
                "Market cap {:.1}B below minimum {:.1}B",
                mcap / 1e9,
                cfg.market_cap_min / 1e9
            ));
        }
        Some(_) => {}
    }

    match snapshot.avg_volume {
        None => return Err("Average volume unavailable".to_string()),
        Some(avg) if avg < cfg.avg_volume_min => {
            return Err(format!(
                "Average volume {:.0} below minimum {:.0}",
                avg, cfg.avg_volume_min
            ));
        }
        Some(_) => {}
    }

    match snapshot.dollar_volume {
        None => return Err("Dollar volume unavailable".to_string()),
        Some(dv) if dv < cfg.min_dollar_volume => {
            return Err(format!(
                "Dollar volume {:.2}B below minimum {:.2}B",
                dv / 1e9,
                cfg.min_dollar_volume / 1e9
            ));
        }
        Some(_) => {}
    }

    if snapshot.positive_fcf_or_income == Some(false) {
        return Err("Negative free cash flow and net income".to_string());
    }

    if let Some(rating) = &snapshot.analyst_rating {
        if rating.eq_ignore_ascii_case("sell") {
            return Err("Analyst consensus is sell".to_string());
        }
    }

    Ok(())
}

/// Score the independent confirmation signals and evaluate them against
/// the tier's policy. Signals with unavailable inputs that are informative
/// only when present (broad-market backdrop, fast selloff) are excluded
/// from the scoreboard entirely; the rest count as failed when missing.
pub fn score_confirmations(
    snapshot: &MetricsSnapshot,
    zone: &ZoneResult,
    tier: &TierResult,
    cfg: &ThresholdConfig,
) -> ConfirmationResult {
    let policy = &tier.policy;
    let mut passed = Vec::new();
    let mut failed = Vec::new();

    let mut check = |ok: bool, label: String| {
        if ok {
            passed.push(label);
        } else {
            failed.push(label);
        }
    };

    let rsi_gate_ok = snapshot.rsi.map(|r| r <= policy.rsi_max);
    check(
        rsi_gate_ok == Some(true),
        format!("RSI<={}", policy.rsi_max),
    );

    let relvol_gate_ok = snapshot.relative_volume.map(|rv| rv >= policy.relvol_min);
    check(
        relvol_gate_ok == Some(true),
        format!("RelVol>={}", policy.relvol_min),
    );

    check(
        snapshot
            .dollar_volume
            .map(|dv| dv >= cfg.min_dollar_volume)
            .unwrap_or(false),
        "$Vol".to_string(),
    );

    check(
        snapshot
            .market_cap
            .map(|mc| mc >= cfg.market_cap_min)
            .unwrap_or(false),
        "MktCap".to_string(),
    );

    check(
        snapshot
            .vwap
            .map(|v| snapshot.price <= v * (1.0 + cfg.vwap_tolerance_pct / 100.0))
            .unwrap_or(false),
        "VWAP touch".to_string(),
    );

    if let Some(index_change) = snapshot.index_change_pct {
        check(
            index_change > cfg.index_backdrop_floor_pct,
            format!("QQQ>{}%", cfg.index_backdrop_floor_pct),
        );
    }

    if cfg.require_fast_selloff {
        if let Some(days) = snapshot.days_since_pullback_start {
            check(days <= cfg.fast_selloff_max_days, "Fast selloff".to_string());
        }
    }

    let score = passed.len() as u32;

    // Stricter bar for names already near (or reclaiming) the trend line
    let required = match zone.zone {
        Zone::Yellow | Zone::Red => policy.min_confirmations + 1,
        Zone::Green => policy.min_confirmations,
    };

    let accepted = match policy.combinator {
        GateCombinator::All => {
            score >= required && rsi_gate_ok == Some(true) && relvol_gate_ok == Some(true)
        }
        GateCombinator::Any => {
            score >= required || rsi_gate_ok == Some(true) || relvol_gate_ok == Some(true)
        }
    };

    ConfirmationResult {
        passed,
        failed,
        score,
        required,
        rsi_gate_ok,
        relvol_gate_ok,
        accepted,
    }
}
