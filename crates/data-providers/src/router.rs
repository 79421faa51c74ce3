//! Fixed-order fallback across market-data adapters.

use chrono::NaiveDate;
use market_core::{MacdValue, MarketError, PriceHistory, Quote, SearchResult, StockDataService};
use std::future::Future;
use std::sync::Arc;

pub type SharedService = Arc<dyn StockDataService>;

/// Ordered adapter list for each operation.
#[derive(Clone, Default)]
pub struct RouterChains {
    pub quotes: Vec<SharedService>,
    pub history: Vec<SharedService>,
    pub search: Vec<SharedService>,
    pub details: Vec<SharedService>,
    pub indicators: Vec<SharedService>,
}

/// Tries each adapter in order and returns the first success.
///
/// Intermediate failures are logged and swallowed; the last adapter's error
/// reaches the caller unchanged.
pub struct DataRouter {
    chains: RouterChains,
    all: Vec<SharedService>,
}

impl DataRouter {
    /// Production ordering: Finnhub leads quotes, details and search;
    /// Twelve Data leads history; Polygon is always last.
    pub fn new(finnhub: SharedService, twelve_data: SharedService, polygon: SharedService) -> Self {
        let chains = RouterChains {
            quotes: vec![finnhub.clone(), twelve_data.clone(), polygon.clone()],
            history: vec![twelve_data.clone(), polygon.clone()],
            search: vec![finnhub.clone(), twelve_data.clone(), polygon.clone()],
            details: vec![finnhub.clone(), twelve_data.clone(), polygon.clone()],
            indicators: vec![twelve_data.clone()],
        };
        Self { chains, all: vec![finnhub, twelve_data, polygon] }
    }

    /// A single adapter serving every operation.
    pub fn single(service: SharedService) -> Self {
        Self::with_chains(RouterChains {
            quotes: vec![service.clone()],
            history: vec![service.clone()],
            search: vec![service.clone()],
            details: vec![service.clone()],
            indicators: vec![service],
        })
    }

    pub fn with_chains(chains: RouterChains) -> Self {
        let mut all: Vec<SharedService> = Vec::new();
        for service in chains
            .quotes
            .iter()
            .chain(&chains.history)
            .chain(&chains.search)
            .chain(&chains.details)
            .chain(&chains.indicators)
        {
            if !all.iter().any(|s| Arc::ptr_eq(s, service)) {
                all.push(service.clone());
            }
        }
        Self { chains, all }
    }

    pub async fn get_quote(&self, ticker: &str) -> Result<Quote, MarketError> {
        run_chain("quote", &self.chains.quotes, |svc| {
            let ticker = ticker.to_string();
            async move { svc.get_quote(&ticker).await }
        })
        .await
    }

    pub async fn get_history(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<PriceHistory, MarketError> {
        run_chain("history", &self.chains.history, |svc| {
            let ticker = ticker.to_string();
            async move { svc.get_history(&ticker, from, to).await }
        })
        .await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError> {
        run_chain("search", &self.chains.search, |svc| {
            let query = query.to_string();
            async move { svc.search(&query).await }
        })
        .await
    }

    pub async fn get_details(&self, ticker: &str) -> Result<Quote, MarketError> {
        run_chain("details", &self.chains.details, |svc| {
            let ticker = ticker.to_string();
            async move { svc.get_details(&ticker).await }
        })
        .await
    }

    pub async fn remote_rsi(&self, ticker: &str, period: usize) -> Result<f64, MarketError> {
        run_chain("rsi", &self.chains.indicators, |svc| {
            let ticker = ticker.to_string();
            async move { svc.remote_rsi(&ticker, period).await }
        })
        .await
    }

    pub async fn remote_macd(&self, ticker: &str) -> Result<MacdValue, MarketError> {
        run_chain("macd", &self.chains.indicators, |svc| {
            let ticker = ticker.to_string();
            async move { svc.remote_macd(&ticker).await }
        })
        .await
    }

    /// Clears the local cache of every distinct adapter.
    pub fn clear_cache(&self) {
        for service in &self.all {
            service.clear_cache();
        }
    }
}

async fn run_chain<T, F, Fut>(operation: &str, chain: &[SharedService], call: F) -> Result<T, MarketError>
where
    F: Fn(SharedService) -> Fut,
    Fut: Future<Output = Result<T, MarketError>>,
{
    let mut last_error = MarketError::InvalidRequest(format!("no providers configured for {}", operation));

    for (position, service) in chain.iter().enumerate() {
        match call(service.clone()).await {
            Ok(value) => {
                if position > 0 {
                    tracing::info!("{} served by fallback provider {}", operation, service.id());
                }
                return Ok(value);
            }
            Err(err) => {
                if position + 1 < chain.len() {
                    tracing::warn!("{} failed on {}: {}; trying next provider", operation, service.id(), err);
                } else {
                    tracing::warn!("{} failed on {}: {}; no providers left", operation, service.id(), err);
                }
                last_error = err;
            }
        }
    }

    Err(last_error)
}
