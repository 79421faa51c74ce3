//! Canned analysis for sample-data mode and as the last fallback.
//!
//! Output depends only on the quote and the analysis kind, so two runs over
//! the same input differ in `fetched_at` alone.

use async_trait::async_trait;
use market_core::{
    AiAnalysis, AiProvider, AiService, AnalysisKind, Clock, IndicatorBundle, MarketError, Pattern,
    PatternSignificance, PriceBar, Quote, Sentiment,
};
use std::sync::Arc;
use technical_analysis::detect_trend;
use uuid::Uuid;

use crate::format::{market_cap, market_cap_category};
use crate::{sentiment_from_change, volume_above_average};

pub struct MockAnalyzer {
    clock: Arc<dyn Clock>,
}

impl MockAnalyzer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Name-based id: the same ticker and kind always map to the same UUID.
    pub fn analysis_id(ticker: &str, kind: AnalysisKind) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("pulse-mock:{}:{}", ticker, kind).as_bytes())
    }
}

fn pattern(name: &str, description: &str, significance: PatternSignificance) -> Pattern {
    Pattern {
        name: name.to_string(),
        description: description.to_string(),
        significance,
    }
}

fn canned_patterns(sentiment: Sentiment) -> Vec<Pattern> {
    match sentiment {
        Sentiment::Bullish => vec![
            pattern(
                "Ascending Triangle",
                "Bullish continuation pattern suggesting upward breakout potential",
                PatternSignificance::High,
            ),
            pattern(
                "Golden Cross",
                "50-day MA crossing above 200-day MA, strong bullish signal",
                PatternSignificance::Medium,
            ),
        ],
        Sentiment::Bearish => vec![pattern(
            "Head and Shoulders",
            "Bearish reversal pattern indicating potential downside",
            PatternSignificance::High,
        )],
        Sentiment::Neutral => vec![pattern(
            "Symmetrical Triangle",
            "Consolidation pattern, breakout direction uncertain",
            PatternSignificance::Medium,
        )],
    }
}

#[async_trait]
impl AiService for MockAnalyzer {
    fn provider(&self) -> AiProvider {
        AiProvider::Mock
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn analyze(&self, quote: &Quote, history: &[PriceBar], kind: AnalysisKind) -> Result<AiAnalysis, MarketError> {
        let quote = quote.with_range_from(history);
        let sentiment = sentiment_from_change(quote.daily_change_percent);
        let up = quote.daily_change >= 0.0;
        let price = quote.current_price;

        let summary = format!(
            "{} ({}) is currently trading at ${:.2}, {} {:.2}% today. The stock shows {} with {}.",
            quote.company_name,
            quote.ticker,
            price,
            if up { "up" } else { "down" },
            quote.daily_change_percent.abs(),
            match sentiment {
                Sentiment::Bullish => "strong momentum",
                Sentiment::Bearish => "weakness",
                Sentiment::Neutral => "consolidation",
            },
            if up { "buyers in control" } else { "selling pressure evident" }
        );

        let strong_volume = volume_above_average(&quote, None);
        let cap = quote.market_cap.unwrap_or(0.0);
        let key_points = vec![
            format!(
                "Price is {} key moving averages, indicating {}",
                if up { "above" } else { "below" },
                if up { "uptrend" } else { "downtrend" }
            ),
            format!(
                "Volume is {} average, suggesting {} conviction",
                if strong_volume { "above" } else { "below" },
                if strong_volume { "strong" } else { "weak" }
            ),
            format!(
                "Market cap of {} positions it as a {} stock",
                market_cap(cap),
                market_cap_category(cap)
            ),
            if up {
                "Momentum indicators suggest continuation potential".to_string()
            } else {
                "Support levels may provide buying opportunities".to_string()
            },
        ];

        let recommendation = match sentiment {
            Sentiment::Bullish => format!(
                "Consider accumulating on dips. Strong fundamentals support current valuation. Watch for resistance near ${:.2}.",
                price * 1.05
            ),
            Sentiment::Bearish => format!(
                "Exercise caution. Wait for stabilization before entering. Support expected around ${:.2}.",
                price * 0.95
            ),
            Sentiment::Neutral => format!(
                "Hold current positions. Wait for clearer directional signals. Range-bound trading likely between ${:.2} - ${:.2}.",
                price * 0.97,
                price * 1.03
            ),
        };

        Ok(AiAnalysis {
            id: Self::analysis_id(&quote.ticker, kind),
            ticker: quote.ticker.clone(),
            kind,
            summary,
            sentiment,
            key_points,
            patterns: canned_patterns(sentiment),
            technical_levels: Vec::new(),
            recommendation,
            confidence: if sentiment == Sentiment::Neutral { 0.65 } else { 0.82 },
            provider: AiProvider::Mock,
            fetched_at: self.clock.now(),
        })
    }

    async fn detect_patterns(&self, history: &[PriceBar]) -> Result<Vec<Pattern>, MarketError> {
        Ok(detect_trend(history))
    }

    async fn generate_insights(&self, quote: &Quote, _indicators: &IndicatorBundle) -> Result<String, MarketError> {
        Ok(format!(
            "{} is trading at ${:.2}. Sample data mode: insights are illustrative only",
            quote.ticker, quote.current_price
        ))
    }

    async fn answer_question(&self, _question: &str, quote: &Quote, _context: &str) -> Result<String, MarketError> {
        Ok(format!(
            "Sample data mode is active, so answers about {} are illustrative only.",
            quote.ticker
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use market_core::ManualClock;

    fn quote() -> Quote {
        Quote {
            ticker: "AAPL".into(),
            company_name: "Apple Inc.".into(),
            current_price: 182.52,
            daily_change: 2.34,
            daily_change_percent: 1.2987,
            volume: 52_430_000,
            average_volume: Some(58_000_000),
            previous_close: 180.18,
            open: 180.5,
            week52_high: Some(199.62),
            week52_low: Some(164.08),
            market_cap: Some(2.85e12),
            pe_ratio: Some(29.5),
            post_market_change: None,
            last_updated: Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_identical_except_fetched_at() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()));
        let mock = MockAnalyzer::new(clock.clone());

        let first = mock.analyze(&quote(), &[], AnalysisKind::Month).await.unwrap();
        clock.advance(Duration::minutes(5));
        let second = mock.analyze(&quote(), &[], AnalysisKind::Month).await.unwrap();

        assert_ne!(first.fetched_at, second.fetched_at);
        let restamped = AiAnalysis { fetched_at: first.fetched_at, ..second };
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&restamped).unwrap()
        );
    }

    #[tokio::test]
    async fn test_neutral_mock_content() {
        let mock = MockAnalyzer::new(Arc::new(ManualClock::new(Utc::now())));
        let analysis = mock.analyze(&quote(), &[], AnalysisKind::General).await.unwrap();

        assert_eq!(analysis.provider, AiProvider::Mock);
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
        assert_eq!(analysis.confidence, 0.65);
        assert!(analysis.technical_levels.is_empty());
        assert_eq!(analysis.patterns[0].name, "Symmetrical Triangle");
        assert_eq!(analysis.key_points[1], "Volume is below average, suggesting weak conviction");
        assert_eq!(analysis.key_points[2], "Market cap of $2.9T positions it as a mega-cap stock");
        assert!(analysis.recommendation.ends_with("between $177.04 - $188.00."));
    }

    #[test]
    fn test_ids_depend_on_ticker_and_kind() {
        let a = MockAnalyzer::analysis_id("AAPL", AnalysisKind::General);
        assert_eq!(a, MockAnalyzer::analysis_id("AAPL", AnalysisKind::General));
        assert_ne!(a, MockAnalyzer::analysis_id("AAPL", AnalysisKind::Week));
        assert_ne!(a, MockAnalyzer::analysis_id("MSFT", AnalysisKind::General));
    }
}
