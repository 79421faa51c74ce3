use market_core::{Pattern, PatternSignificance, PriceBar};

/// Percent move between first and last close that counts as a trend.
pub const TREND_THRESHOLD_PCT: f64 = 5.0;

/// Close-to-close change in percent over the whole window.
pub fn period_change_percent(bars: &[PriceBar]) -> Option<f64> {
    let first = bars.first()?.close;
    let last = bars.last()?.close;
    if first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

/// Flags a strong up- or downtrend across the given bars.
pub fn detect_trend(bars: &[PriceBar]) -> Vec<Pattern> {
    let Some(change) = period_change_percent(bars) else {
        return vec![];
    };

    if change > TREND_THRESHOLD_PCT {
        vec![Pattern {
            name: "Uptrend".to_string(),
            description: format!("Strong upward price movement over the period ({:+.1}%)", change),
            significance: PatternSignificance::High,
        }]
    } else if change < -TREND_THRESHOLD_PCT {
        vec![Pattern {
            name: "Downtrend".to_string(),
            description: format!("Strong downward price movement over the period ({:+.1}%)", change),
            significance: PatternSignificance::High,
        }]
    } else {
        vec![]
    }
}

/// The trailing `lookback` bars, or all of them.
pub fn trailing(bars: &[PriceBar], lookback: Option<usize>) -> &[PriceBar] {
    match lookback {
        Some(n) if n < bars.len() => &bars[bars.len() - n..],
        _ => bars,
    }
}
