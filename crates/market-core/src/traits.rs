use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    AiAnalysis, AiProvider, AnalysisKind, IndicatorBundle, MacdValue, MarketError, Pattern,
    PriceBar, PriceHistory, Quote, SearchResult,
};

/// One upstream market-data source behind a uniform contract.
#[async_trait]
pub trait StockDataService: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &'static str;

    async fn get_quote(&self, ticker: &str) -> Result<Quote, MarketError>;

    /// Daily bars with `from <= date <= to`, ascending.
    async fn get_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceHistory, MarketError>;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError>;

    async fn get_details(&self, ticker: &str) -> Result<Quote, MarketError>;

    /// Drops every adapter-local cached response.
    fn clear_cache(&self);

    async fn remote_rsi(&self, _ticker: &str, _period: usize) -> Result<f64, MarketError> {
        Err(MarketError::InvalidRequest(format!("{} does not serve RSI", self.id())))
    }

    async fn remote_macd(&self, _ticker: &str) -> Result<MacdValue, MarketError> {
        Err(MarketError::InvalidRequest(format!("{} does not serve MACD", self.id())))
    }
}

/// One analysis backend (rule engine, hosted model, or canned data).
#[async_trait]
pub trait AiService: Send + Sync {
    fn provider(&self) -> AiProvider;

    /// Static capability check; never touches the network.
    fn is_available(&self) -> bool;

    async fn analyze(
        &self,
        quote: &Quote,
        history: &[PriceBar],
        kind: AnalysisKind,
    ) -> Result<AiAnalysis, MarketError>;

    async fn detect_patterns(&self, history: &[PriceBar]) -> Result<Vec<Pattern>, MarketError>;

    async fn generate_insights(
        &self,
        quote: &Quote,
        indicators: &IndicatorBundle,
    ) -> Result<String, MarketError>;

    async fn answer_question(
        &self,
        question: &str,
        quote: &Quote,
        context: &str,
    ) -> Result<String, MarketError>;
}
