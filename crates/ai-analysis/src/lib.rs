pub mod cloud;
pub mod format;
pub mod mock;
pub mod on_device;
pub mod parse;
pub mod prompts;

pub use cloud::GeminiClient;
pub use mock::MockAnalyzer;
pub use on_device::OnDeviceAnalyzer;
pub use parse::{parse_analysis, parse_patterns, PartialAnalysis};

use market_core::{Quote, Sentiment};

/// Sentiment from the day's move alone: beyond ±1.5% is directional.
pub fn sentiment_from_change(daily_change_percent: f64) -> Sentiment {
    if daily_change_percent > 1.5 {
        Sentiment::Bullish
    } else if daily_change_percent < -1.5 {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

/// Whether today's volume beats the quote's average (or itself when unknown).
pub(crate) fn volume_above_average(quote: &Quote, fallback_average: Option<f64>) -> bool {
    let average = quote
        .average_volume
        .map(|v| v as f64)
        .or(fallback_average)
        .unwrap_or(quote.volume as f64);
    quote.volume as f64 > average
}
