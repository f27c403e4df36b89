use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::US::Eastern;

/// Saturday or Sunday in US/Eastern.
pub fn is_weekend(now: DateTime<Utc>) -> bool {
    let et = now.with_timezone(&Eastern);
    matches!(et.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

/// Regular US session, 9:30-16:00 ET, with an optional settle-in window
/// after the open. Holidays are not modeled; a scan on a holiday just
/// finds no movement.
pub fn is_market_open(now: DateTime<Utc>, cooldown_minutes_after_open: i64) -> bool {
    if is_weekend(now) {
        return false;
    }
    let et = now.with_timezone(&Eastern);
    let minutes = (et.hour() * 60 + et.minute()) as i64;
    let open = 9 * 60 + 30 + cooldown_minutes_after_open;
    let close = 16 * 60;
    minutes >= open && minutes <= close
}
