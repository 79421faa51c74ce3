//! Rule-based analyzer that runs without any network access.

use async_trait::async_trait;
use market_core::{
    AiAnalysis, AiProvider, AiService, AnalysisKind, Clock, IndicatorBundle, MarketError, Pattern,
    PriceBar, Quote, Sentiment,
};
use std::sync::Arc;
use technical_analysis::{compute_bundle, derive_levels, detect_trend, trailing};
use uuid::Uuid;

use crate::{sentiment_from_change, volume_above_average};

pub struct OnDeviceAnalyzer {
    clock: Arc<dyn Clock>,
    available: bool,
}

impl OnDeviceAnalyzer {
    /// `available` is the static capability flag from configuration.
    pub fn new(clock: Arc<dyn Clock>, available: bool) -> Self {
        Self { clock, available }
    }

    fn ensure_available(&self) -> Result<(), MarketError> {
        if self.available {
            Ok(())
        } else {
            Err(MarketError::InvalidRequest("on-device analysis is not available".into()))
        }
    }
}

fn key_points(quote: &Quote, ind: &IndicatorBundle) -> Vec<String> {
    let mut points = Vec::new();

    if let Some(rsi) = ind.rsi14 {
        let reading = rsi as i64;
        points.push(if rsi > 70.0 {
            format!("RSI at {} indicates overbought conditions, potential pullback ahead", reading)
        } else if rsi < 30.0 {
            format!("RSI at {} indicates oversold conditions, potential bounce opportunity", reading)
        } else {
            format!("RSI at {} shows healthy momentum with room to move", reading)
        });
    }

    if let Some(sma20) = ind.sma20 {
        let distance = (quote.current_price - sma20) / sma20 * 100.0;
        points.push(format!(
            "Price {} 20-day MA by {:.1}%",
            if distance > 0.0 { "above" } else { "below" },
            distance.abs()
        ));
    }

    if let Some(macd) = ind.macd {
        let rising = macd.histogram > 0.0;
        points.push(format!(
            "MACD {}, momentum {}",
            if rising { "positive" } else { "negative" },
            if rising { "building" } else { "weakening" }
        ));
    }

    let strong = volume_above_average(quote, ind.average_volume20);
    points.push(format!(
        "Volume {} average, indicating {} conviction",
        if strong { "above" } else { "below" },
        if strong { "strong" } else { "weak" }
    ));

    points
}

fn horizon(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::General => "",
        AnalysisKind::Month => " Outlook covers the next 30 days.",
        AnalysisKind::Week => " Outlook covers the next 5-7 trading days.",
    }
}

fn recommendation(sentiment: Sentiment, price: f64) -> String {
    match sentiment {
        Sentiment::Bullish => format!(
            "Technical indicators support upward momentum. Consider positions on dips. Watch for resistance near ${:.2}.",
            price * 1.05
        ),
        Sentiment::Bearish => format!(
            "Caution advised as indicators show weakness. Wait for stabilization. Support expected around ${:.2}.",
            price * 0.95
        ),
        Sentiment::Neutral => format!(
            "Mixed signals suggest range-bound trading. Hold positions and wait for clearer direction between ${:.2}-${:.2}.",
            price * 0.97,
            price * 1.03
        ),
    }
}

#[async_trait]
impl AiService for OnDeviceAnalyzer {
    fn provider(&self) -> AiProvider {
        AiProvider::OnDevice
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn analyze(&self, quote: &Quote, history: &[PriceBar], kind: AnalysisKind) -> Result<AiAnalysis, MarketError> {
        self.ensure_available()?;

        let indicators = compute_bundle(history);
        let quote = quote.with_range_from(history);
        let sentiment = sentiment_from_change(quote.daily_change_percent);

        let summary = format!(
            "{} ({}) is trading at ${:.2}, {} {:.2}% today. Technical analysis suggests {}.{}",
            quote.company_name,
            quote.ticker,
            quote.current_price,
            if quote.daily_change >= 0.0 { "up" } else { "down" },
            quote.daily_change_percent.abs(),
            match sentiment {
                Sentiment::Bullish => "bullish momentum",
                Sentiment::Bearish => "bearish pressure",
                Sentiment::Neutral => "neutral consolidation",
            },
            horizon(kind)
        );

        let patterns = detect_trend(trailing(history, kind.lookback_bars()));
        let levels = derive_levels(quote.current_price, quote.week52_high, quote.week52_low, &indicators);

        tracing::debug!(
            "On-device analysis for {} ({}): {} with {} levels",
            quote.ticker,
            kind,
            sentiment.as_str(),
            levels.len()
        );

        Ok(AiAnalysis {
            id: Uuid::new_v4(),
            ticker: quote.ticker.clone(),
            kind,
            summary,
            sentiment,
            key_points: key_points(&quote, &indicators),
            patterns,
            technical_levels: levels,
            recommendation: recommendation(sentiment, quote.current_price),
            confidence: if sentiment == Sentiment::Neutral { 0.70 } else { 0.85 },
            provider: AiProvider::OnDevice,
            fetched_at: self.clock.now(),
        })
    }

    async fn detect_patterns(&self, history: &[PriceBar]) -> Result<Vec<Pattern>, MarketError> {
        self.ensure_available()?;
        Ok(detect_trend(history))
    }

    async fn generate_insights(&self, quote: &Quote, indicators: &IndicatorBundle) -> Result<String, MarketError> {
        self.ensure_available()?;
        let mut insights = Vec::new();

        if let Some(rsi) = indicators.rsi14 {
            insights.push(if rsi > 70.0 {
                "RSI indicates overbought conditions"
            } else if rsi < 30.0 {
                "RSI indicates oversold conditions"
            } else {
                "RSI shows healthy momentum"
            });
        }

        if let (Some(sma20), Some(sma50)) = (indicators.sma20, indicators.sma50) {
            let price = quote.current_price;
            if price > sma20 && price > sma50 {
                insights.push("Price above key moving averages, indicating uptrend");
            } else if price < sma20 && price < sma50 {
                insights.push("Price below key moving averages, indicating downtrend");
            }
        }

        Ok(insights.join(". "))
    }

    async fn answer_question(&self, question: &str, quote: &Quote, _context: &str) -> Result<String, MarketError> {
        self.ensure_available()?;
        let lowered = question.to_lowercase();

        Ok(if lowered.contains("buy") {
            "Based on current indicators, consider your risk tolerance and investment goals before making decisions."
                .to_string()
        } else if lowered.contains("sell") {
            "Review the technical analysis and your investment strategy to determine if selling aligns with your goals."
                .to_string()
        } else {
            format!(
                "I can help analyze {} using technical indicators. What specific aspect would you like to know more about?",
                quote.ticker
            )
        })
    }
}
