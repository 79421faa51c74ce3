//! Concurrent per-ticker quote fetching that tolerates individual failures.

use market_cache::WatchlistStore;
use market_core::{normalize_ticker, MarketError, Quote};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::market_service::MarketDataService;

pub const MARKET_INDICES: [&str; 3] = ["SPY", "QQQ", "DIA"];
pub const DEFAULT_WATCHLIST: [&str; 1] = ["AAPL"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistSnapshot {
    /// Sorted by ticker.
    pub watchlist: Vec<Quote>,
    pub indices: Vec<Quote>,
}

pub struct QuoteFanout {
    market: Arc<MarketDataService>,
    watchlist: WatchlistStore,
}

impl QuoteFanout {
    pub fn new(market: Arc<MarketDataService>, watchlist: WatchlistStore) -> Self {
        Self { market, watchlist }
    }

    /// Fetches every ticker concurrently. Tickers that fail are logged and
    /// left out; the result keeps input order with duplicates collapsed.
    ///
    /// Errors only when a fetch task itself dies.
    pub async fn fetch_quotes(&self, tickers: &[String]) -> Result<Vec<Quote>, MarketError> {
        let mut unique: Vec<String> = Vec::with_capacity(tickers.len());
        for ticker in tickers.iter().map(|t| normalize_ticker(t)) {
            if !ticker.is_empty() && !unique.contains(&ticker) {
                unique.push(ticker);
            }
        }

        let mut tasks = JoinSet::new();
        for ticker in unique.iter().cloned() {
            let market = Arc::clone(&self.market);
            tasks.spawn(async move {
                let result = market.quote(&ticker).await;
                (ticker, result)
            });
        }

        let mut fetched: HashMap<String, Quote> = HashMap::with_capacity(unique.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ticker, Ok(quote))) => {
                    fetched.insert(ticker, quote);
                }
                Ok((ticker, Err(e))) => {
                    tracing::warn!("Failed to fetch {}: {}", ticker, e);
                }
                Err(e) => {
                    tracing::error!("Quote task failed: {}", e);
                    tasks.abort_all();
                    return Err(MarketError::Internal(format!("quote task failed: {}", e)));
                }
            }
        }

        tracing::debug!("Fetched {}/{} quotes", fetched.len(), unique.len());
        Ok(unique.into_iter().filter_map(|t| fetched.remove(&t)).collect())
    }

    /// Saved tickers, falling back to (and persisting) the default list.
    pub async fn watchlist_tickers(&self) -> Vec<String> {
        let saved = match self.watchlist.tickers().await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!("Failed to load watchlist, using defaults: {}", e);
                return DEFAULT_WATCHLIST.iter().map(|t| t.to_string()).collect();
            }
        };
        if !saved.is_empty() {
            return saved;
        }

        let defaults: Vec<String> = DEFAULT_WATCHLIST.iter().map(|t| t.to_string()).collect();
        if let Err(e) = self.watchlist.save_tickers(&defaults).await {
            tracing::warn!("Failed to persist default watchlist: {}", e);
        }
        defaults
    }

    /// Watchlist quotes (sorted by ticker) and the market indices, fetched
    /// together.
    pub async fn load_watchlist(&self) -> Result<WatchlistSnapshot, MarketError> {
        let tickers = self.watchlist_tickers().await;
        let indices: Vec<String> = MARKET_INDICES.iter().map(|t| t.to_string()).collect();

        let (watchlist, indices) = tokio::join!(self.fetch_quotes(&tickers), self.fetch_quotes(&indices));
        let mut watchlist = watchlist?;
        watchlist.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        tracing::info!("Loaded {} watchlist quotes", watchlist.len());
        Ok(WatchlistSnapshot {
            watchlist,
            indices: indices?,
        })
    }
}
