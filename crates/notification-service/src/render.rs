use scanner_core::{Decision, Zone};

fn fmt(val: Option<f64>, decimals: usize) -> String {
    match val {
        Some(v) => format!("{:.*}", decimals, v),
        None => "n/a".to_string(),
    }
}

/// Render an accepted decision into the alert message block sent to all
/// channels. Every optional metric degrades to "n/a" rather than being
/// dropped, so the line layout is stable.
pub fn render_dip_alert(decision: &Decision, breadth_line: Option<&str>) -> String {
    let snap = &decision.snapshot;

    let (tier_emoji, tier_label) = match &decision.tier {
        Some(t) => (t.tier.emoji(), t.tier.label()),
        None => ("⚪️", "Untiered"),
    };
    let (grade_emoji, grade_letter) = match &decision.zone {
        Some(z) => (z.grade.emoji(), z.grade.letter()),
        None => ("⚪️", '?'),
    };

    let header = format!(
        "{} {} **{} — {} ({})**",
        tier_emoji,
        grade_emoji,
        snap.ticker,
        snap.name.as_deref().unwrap_or(""),
        snap.sector.as_deref().unwrap_or("N/A"),
    );

    let (dip_text, metric_label) = match &decision.tier {
        Some(t) => (format!("{:.2}", t.dip_pct), t.metric.label()),
        None => ("n/a".to_string(), "n/a"),
    };
    let dist200 = decision.zone.as_ref().map(|z| z.ma200_dist_pct);
    let qqq_text = match snap.index_change_pct {
        Some(q) => format!("{q:.2}%"),
        None => "n/a".to_string(),
    };
    let line2 = format!(
        "{} · Grade {} · Dip {}% ({}) · Dist200 {}% · RSI {} · RelVol {} · $Vol {}B · QQQ {}",
        tier_label,
        grade_letter,
        dip_text,
        metric_label,
        fmt(dist200, 2),
        fmt(snap.rsi, 1),
        fmt(snap.relative_volume, 2),
        fmt(snap.dollar_volume.map(|dv| dv / 1e9), 2),
        qqq_text,
    );

    let line3 = format!(
        "Px {:.2} | Prev {} | Intraday Low {} | VWAP {} | MA200 {}",
        snap.price,
        fmt(snap.prev_close, 2),
        fmt(snap.intraday_low, 2),
        fmt(snap.vwap, 2),
        fmt(snap.ma200, 2),
    );

    let mut lines = vec![header, line2, line3];

    if let Some(conf) = &decision.confirmations {
        if !conf.passed.is_empty() {
            lines.push(format!("Why ✅ {}", conf.passed.join(" • ")));
        }
        if !conf.failed.is_empty() {
            let shown: Vec<&str> = conf.failed.iter().take(3).map(String::as_str).collect();
            lines.push(format!("Why ❌ {}", shown.join(" • ")));
        }
    }

    let mut risks = Vec::new();
    if let Some(zone) = &decision.zone {
        if zone.zone == Zone::Red {
            risks.push("Below 200DMA");
        }
        if zone.reclaimed {
            risks.push("Reclaimed after floor breach");
        }
    }
    if !risks.is_empty() {
        lines.push(format!("⚠️ Risk · {}", risks.join(" | ")));
    }

    if let Some(breadth) = breadth_line {
        if !breadth.is_empty() {
            lines.push(format!("Context: {breadth}"));
        }
    }

    lines.join("\n")
}
