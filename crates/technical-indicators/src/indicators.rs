use scanner_core::{Candle, MaSlope};

/// Simple Moving Average over the trailing `period` values.
/// Returns None when there is not enough data.
pub fn sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    let sum: f64 = data[data.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Exponential Moving Average series (SMA-seeded).
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(data.len());

    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;
    result.push(seed);

    for value in &data[period..] {
        let prev = *result.last().unwrap();
        result.push((value - prev) * multiplier + prev);
    }

    result
}

/// Wilder RSI, returning the latest value.
pub fn rsi(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for pair in data.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Volume-weighted average price over intraday candles.
pub fn vwap(candles: &[Candle]) -> Option<f64> {
    let total_volume: f64 = candles.iter().map(|c| c.volume).sum();
    if total_volume == 0.0 {
        return None;
    }
    let weighted: f64 = candles.iter().map(|c| c.close * c.volume).sum();
    Some(weighted / total_volume)
}

/// Today's volume as a multiple of the average.
pub fn relative_volume(latest_vol: f64, avg_vol: f64) -> Option<f64> {
    if avg_vol == 0.0 {
        return None;
    }
    Some(latest_vol / avg_vol)
}

/// Approximate slope of a `window`-period moving average over a short
/// lookback, as change per day. Positive means the MA is rising.
pub fn ma_slope_value(closes: &[f64], window: usize, lookback: usize) -> Option<f64> {
    if window == 0 || lookback == 0 || closes.len() < window + lookback {
        return None;
    }

    let latest = sma(&closes[..], window)?;
    let prior = sma(&closes[..closes.len() - lookback], window)?;
    Some((latest - prior) / lookback as f64)
}

/// Classify an MA slope value into rising/flat/falling.
/// `flat_epsilon` bounds the dead band around zero.
pub fn classify_slope(slope: f64, flat_epsilon: f64) -> MaSlope {
    if slope > flat_epsilon {
        MaSlope::Rising
    } else if slope < -flat_epsilon {
        MaSlope::Falling
    } else {
        MaSlope::Flat
    }
}
