//! Point indicators over an ascending series.
//!
//! Every function returns `None` when the series is too short; none of them
//! substitute zero for missing data.

use market_core::{BollingerValue, IndicatorBundle, MacdValue, PriceBar};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_K: f64 = 2.0;
pub const VOLUME_PERIOD: usize = 20;
/// Current volume must exceed the average by this factor to count as elevated.
pub const VOLUME_SPIKE_FACTOR: f64 = 1.5;

/// Simple Moving Average of the last `period` values.
pub fn sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    let sum: f64 = data[data.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Running EMA. Element `j` equals the EMA of `data[..period + j]`.
///
/// Seeded with the SMA of the first `period` values.
pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(data.len() - period + 1);
    result.push(seed);
    let mut ema = seed;
    for price in &data[period..] {
        ema = (price - ema) * multiplier + ema;
        result.push(ema);
    }
    result
}

/// Exponential Moving Average at the last point.
pub fn ema(data: &[f64], period: usize) -> Option<f64> {
    ema_series(data, period).last().copied()
}

/// Relative Strength Index over the last `period` changes.
///
/// Returns exactly 100 when the window has no losses.
pub fn rsi(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() <= period {
        return None;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = data
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let avg_gain = sma(&gains, period)?;
    let avg_loss = sma(&losses, period)?;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line, signal and histogram.
///
/// The signal is the EMA of the MACD line evaluated at every prefix ending
/// at index `slow` and later. Each prefix EMA is the running EMA at that
/// index, so the history is read off the two running series.
pub fn macd(data: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdValue> {
    if fast == 0 || signal == 0 || fast > slow {
        return None;
    }

    let fast_series = ema_series(data, fast);
    let slow_series = ema_series(data, slow);
    if slow_series.is_empty() {
        return None;
    }

    let history: Vec<f64> = (slow..data.len())
        .map(|i| fast_series[i + 1 - fast] - slow_series[i + 1 - slow])
        .collect();

    let signal_line = ema(&history, signal)?;
    let line = fast_series.last()? - slow_series.last()?;

    Some(MacdValue {
        line,
        signal: signal_line,
        histogram: line - signal_line,
    })
}

/// MACD with the standard 12/26/9 parameters.
pub fn macd_default(data: &[f64]) -> Option<MacdValue> {
    macd(data, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
}

/// Bollinger Bands using the population standard deviation.
pub fn bollinger(data: &[f64], period: usize, k: f64) -> Option<BollingerValue> {
    let middle = sma(data, period)?;
    let window = &data[data.len() - period..];
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(BollingerValue {
        upper: middle + k * std_dev,
        middle,
        lower: middle - k * std_dev,
    })
}

/// Mean of the last `period` volumes.
pub fn average_volume(volumes: &[u64], period: usize) -> Option<f64> {
    if period == 0 || volumes.len() < period {
        return None;
    }
    let total: u64 = volumes[volumes.len() - period..].iter().sum();
    Some(total as f64 / period as f64)
}

/// False whenever the average cannot be computed.
pub fn is_volume_above_average(current: u64, volumes: &[u64], period: usize) -> bool {
    average_volume(volumes, period)
        .map(|avg| current as f64 > avg * VOLUME_SPIKE_FACTOR)
        .unwrap_or(false)
}

/// Everything the level deriver and the analyzers read, from one series.
pub fn compute_bundle(bars: &[PriceBar]) -> IndicatorBundle {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    IndicatorBundle {
        sma20: sma(&closes, 20),
        sma50: sma(&closes, 50),
        sma200: sma(&closes, 200),
        rsi14: rsi(&closes, RSI_PERIOD),
        macd: macd_default(&closes),
        bollinger: bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_K),
        average_volume20: average_volume(&volumes, VOLUME_PERIOD),
    }
}
