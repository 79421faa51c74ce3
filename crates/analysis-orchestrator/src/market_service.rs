//! Read-through market data: persistent cache first, then the provider router.

use chrono::{Duration, NaiveDate};
use data_providers::DataRouter;
use market_cache::CacheGateway;
use market_core::{
    normalize_ticker, ChartTimeframe, Clock, MarketError, PriceBar, PriceHistory, Quote, SearchResult,
};
use std::sync::Arc;

use crate::recent::RecentSearches;

/// Calendar days loaded for charts; every timeframe is filtered from this.
pub const FULL_HISTORY_DAYS: i64 = 370;

pub struct MarketDataService {
    router: Arc<DataRouter>,
    gateway: CacheGateway,
    recent: RecentSearches,
    clock: Arc<dyn Clock>,
}

impl MarketDataService {
    pub fn new(router: Arc<DataRouter>, gateway: CacheGateway, recent: RecentSearches, clock: Arc<dyn Clock>) -> Self {
        Self {
            router,
            gateway,
            recent,
            clock,
        }
    }

    pub fn gateway(&self) -> &CacheGateway {
        &self.gateway
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    pub async fn quote(&self, ticker: &str) -> Result<Quote, MarketError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(MarketError::InvalidRequest("ticker must not be empty".into()));
        }

        if let Some(cached) = self.gateway.quote(&ticker).await {
            return Ok(cached);
        }

        let quote = self.router.get_quote(&ticker).await?;
        self.gateway.put_quote(&quote).await;
        Ok(quote)
    }

    pub async fn history(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<PriceHistory, MarketError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(MarketError::InvalidRequest("ticker must not be empty".into()));
        }
        if from > to {
            return Err(MarketError::InvalidRequest(format!("history window {} .. {} is inverted", from, to)));
        }

        if let Some(cached) = self.gateway.history(&ticker, from, to).await {
            return Ok(cached);
        }

        let bars = self.router.get_history(&ticker, from, to).await?;
        self.gateway.put_history(&ticker, from, to, &bars).await;
        Ok(bars)
    }

    /// The trailing history window ending today. Day-aligned so repeated
    /// calls on the same day share one cache entry.
    pub async fn full_history(&self, ticker: &str) -> Result<PriceHistory, MarketError> {
        self.recent_history(ticker, FULL_HISTORY_DAYS).await
    }

    pub async fn recent_history(&self, ticker: &str, days: i64) -> Result<PriceHistory, MarketError> {
        let to = self.today();
        let from = Duration::try_days(days.max(0))
            .and_then(|span| to.checked_sub_signed(span))
            .ok_or_else(|| MarketError::InvalidRequest(format!("{} days of history is out of range", days)))?;
        self.history(ticker, from, to).await
    }

    /// Client-side slice of a loaded history for one chart timeframe.
    pub fn for_timeframe(bars: &[PriceBar], timeframe: ChartTimeframe, today: NaiveDate) -> Vec<PriceBar> {
        let from = timeframe.start_date(today);
        bars.iter().filter(|b| b.date >= from).copied().collect()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.router.search(query).await
    }

    /// Records a search result the user picked.
    pub async fn remember_search(&self, result: SearchResult) -> Vec<SearchResult> {
        match self.recent.remember(result).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Failed to persist recent search: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn recent_searches(&self) -> Vec<SearchResult> {
        self.recent.list().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to load recent searches: {}", e);
            Vec::new()
        })
    }

    pub async fn clear_recent_searches(&self) -> Result<(), MarketError> {
        self.recent.clear().await
    }

    /// Full issuer details, always fresh from the providers.
    pub async fn details(&self, ticker: &str) -> Result<Quote, MarketError> {
        self.router.get_details(&normalize_ticker(ticker)).await
    }

    pub fn clear_adapter_caches(&self) {
        self.router.clear_cache();
    }

    pub async fn clear_expired(&self) -> usize {
        self.gateway.clear_expired().await
    }
}
