//! Prompt text for the hosted model, one profile per analysis kind.

use market_core::{AnalysisKind, IndicatorBundle, PriceBar, Quote};
use std::fmt::Write;

use crate::format::{compact, currency, percentage};

/// Closes sent for pattern detection.
const PATTERN_WINDOW: usize = 30;

const GENERAL_SCHEMA: &str = r#"Respond ONLY with valid JSON in this exact format:
{
  "summary": "Brief 2-3 sentence overview",
  "sentiment": "bullish" or "bearish" or "neutral",
  "keyPoints": ["point 1", "point 2", "point 3"],
  "patterns": [{"name": "pattern name", "description": "what it means", "significance": "high/medium/low"}],
  "recommendation": "Brief recommendation",
  "confidence": 0.85
}"#;

const MONTH_FOCUS: &str = r#"Focus on:
- Monthly support/resistance zones
- 30-day trend projection
- Key price targets for the month
- Potential breakout/breakdown levels

Respond ONLY with valid JSON:
{
  "summary": "2-3 sentence 30-day outlook",
  "sentiment": "bullish/bearish/neutral",
  "keyPoints": ["monthly insight 1", "monthly insight 2", "monthly insight 3"],
  "patterns": [{"name": "pattern", "description": "monthly significance", "significance": "high/medium/low"}],
  "recommendation": "30-day trading strategy",
  "confidence": 0.85
}"#;

const WEEK_FOCUS: &str = r#"Focus on:
- Daily support/resistance levels
- Short-term momentum (next 5-7 days)
- Intraday volatility expectations
- Immediate price targets

Respond ONLY with valid JSON:
{
  "summary": "2-3 sentence 7-day outlook",
  "sentiment": "bullish/bearish/neutral",
  "keyPoints": ["daily insight 1", "daily insight 2", "daily insight 3"],
  "patterns": [{"name": "pattern", "description": "short-term significance", "significance": "high/medium/low"}],
  "recommendation": "7-day trading strategy",
  "confidence": 0.85
}"#;

pub fn analysis_prompt(quote: &Quote, indicators: &IndicatorBundle, kind: AnalysisKind) -> String {
    match kind {
        AnalysisKind::General => general(quote, indicators),
        AnalysisKind::Month => month(quote, indicators),
        AnalysisKind::Week => week(quote, indicators),
    }
}

fn range(quote: &Quote) -> String {
    format!(
        "${} - ${}",
        currency(quote.week52_low.unwrap_or(0.0)),
        currency(quote.week52_high.unwrap_or(0.0))
    )
}

fn general(quote: &Quote, ind: &IndicatorBundle) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Analyze this stock and provide a structured analysis in JSON format.\n");
    let _ = writeln!(p, "Stock: {} ({})", quote.ticker, quote.company_name);
    let _ = writeln!(p, "Current Price: ${}", currency(quote.current_price));
    let _ = writeln!(
        p,
        "Daily Change: {} ({}{})",
        percentage(quote.daily_change_percent),
        if quote.daily_change >= 0.0 { "+" } else { "" },
        currency(quote.daily_change)
    );
    let _ = writeln!(p, "52-Week Range: {}", range(quote));
    let _ = writeln!(p, "Market Cap: {}", compact(quote.market_cap.unwrap_or(0.0)));
    let _ = write!(p, "\nTechnical Indicators:");
    if let Some(rsi) = ind.rsi14 {
        let _ = write!(p, "\n- RSI (14): {:.2}", rsi);
    }
    if let Some(m) = ind.macd {
        let _ = write!(p, "\n- MACD: {:.2} (Signal: {:.2})", m.line, m.signal);
    }
    if let Some(v) = ind.sma20 {
        let _ = write!(p, "\n- 20-day SMA: ${:.2}", v);
    }
    if let Some(v) = ind.sma50 {
        let _ = write!(p, "\n- 50-day SMA: ${:.2}", v);
    }
    let _ = write!(p, "\n\n{}", GENERAL_SCHEMA);
    p
}

fn month(quote: &Quote, ind: &IndicatorBundle) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Provide a 1-MONTH TECHNICAL FORECAST for this stock in JSON format.\n");
    let _ = writeln!(p, "Stock: {} ({})", quote.ticker, quote.company_name);
    let _ = writeln!(p, "Current Price: ${}", currency(quote.current_price));
    let _ = writeln!(p, "Daily Change: {}", percentage(quote.daily_change_percent));
    let _ = writeln!(p, "52-Week Range: {}", range(quote));
    let _ = write!(p, "\nTechnical Indicators:");
    if let Some(rsi) = ind.rsi14 {
        let _ = write!(p, "\n- RSI: {:.2}", rsi);
    }
    if let Some(m) = ind.macd {
        let _ = write!(p, "\n- MACD: {:.2} (Signal: {:.2})", m.line, m.signal);
    }
    if let (Some(s20), Some(s50)) = (ind.sma20, ind.sma50) {
        let _ = write!(p, "\n- 20/50 SMA: ${:.2} / ${:.2}", s20, s50);
    }
    let _ = write!(p, "\n\n{}", MONTH_FOCUS);
    p
}

fn week(quote: &Quote, ind: &IndicatorBundle) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Provide a 1-WEEK TECHNICAL FORECAST for this stock in JSON format.\n");
    let _ = writeln!(p, "Stock: {} ({})", quote.ticker, quote.company_name);
    let _ = writeln!(p, "Current Price: ${}", currency(quote.current_price));
    let _ = writeln!(p, "Daily Change: {}", percentage(quote.daily_change_percent));
    let _ = writeln!(p, "Volume: {}", compact(quote.volume as f64));
    let _ = write!(p, "\nTechnical Indicators:");
    if let Some(rsi) = ind.rsi14 {
        let _ = write!(p, "\n- RSI: {:.2}", rsi);
    }
    if let Some(m) = ind.macd {
        let _ = write!(p, "\n- MACD: {:.2}", m.line);
    }
    if let Some(v) = ind.sma20 {
        let _ = write!(p, "\n- 20-day SMA: ${:.2}", v);
    }
    if let Some(b) = ind.bollinger {
        let _ = write!(p, "\n- Bollinger Bands: ${:.2} - ${:.2}", b.lower, b.upper);
    }
    let _ = write!(p, "\n\n{}", WEEK_FOCUS);
    p
}

pub fn pattern_prompt(history: &[PriceBar]) -> String {
    let start = history.len().saturating_sub(PATTERN_WINDOW);
    let closes: Vec<String> = history[start..].iter().map(|b| format!("{:.2}", b.close)).collect();
    format!(
        "Analyze these recent stock prices and detect chart patterns:\n{}\n\n\
         Respond with JSON array of patterns:\n\
         [{{\"name\": \"pattern name\", \"description\": \"description\", \"significance\": \"high/medium/low\"}}]",
        closes.join(", ")
    )
}

pub fn insights_prompt(quote: &Quote, ind: &IndicatorBundle) -> String {
    let mut p = format!(
        "Provide 3-5 key insights about {} based on current price and technical indicators.\n\
         Keep each insight to one sentence.\n\nCurrent Price: ${}",
        quote.ticker,
        currency(quote.current_price)
    );
    if let Some(rsi) = ind.rsi14 {
        let _ = write!(p, "\nRSI (14): {:.2}", rsi);
    }
    if let Some(m) = ind.macd {
        let _ = write!(p, "\nMACD histogram: {:.2}", m.histogram);
    }
    if let (Some(s20), Some(s50)) = (ind.sma20, ind.sma50) {
        let _ = write!(p, "\n20/50 SMA: ${:.2} / ${:.2}", s20, s50);
    }
    p
}

pub fn question_prompt(question: &str, quote: &Quote, context: &str) -> String {
    format!(
        "You are a financial analyst assistant. Answer this question about {} ({}):\n\n\
         Question: {}\n\nContext:\n{}\n\n\
         Provide a concise, helpful answer based on the data provided.",
        quote.ticker, quote.company_name, question, context
    )
}
