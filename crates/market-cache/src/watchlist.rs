use chrono::{DateTime, Utc};
use market_core::{normalize_ticker, Clock, MarketError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::record::{Collection, Record, RecordStore};

/// A saved ticker. `sort_order` is the explicit position in the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    pub company_name: Option<String>,
    pub added_at: DateTime<Utc>,
    pub sort_order: i64,
}

/// Ordered, persistent list of tickers the user follows.
#[derive(Clone)]
pub struct WatchlistStore {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl WatchlistStore {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Entries in display order.
    pub async fn load(&self) -> Result<Vec<WatchlistEntry>, MarketError> {
        let records = self.store.scan(Collection::Watchlist, &|_| true).await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_str::<WatchlistEntry>(&record.payload) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping unreadable watchlist entry {}: {}", record.key, e),
            }
        }
        Ok(entries)
    }

    pub async fn tickers(&self) -> Result<Vec<String>, MarketError> {
        Ok(self.load().await?.into_iter().map(|e| e.ticker).collect())
    }

    /// Replaces the whole list. Duplicates keep their first position.
    pub async fn save_tickers(&self, tickers: &[String]) -> Result<(), MarketError> {
        self.store.delete_all(Collection::Watchlist).await?;

        let now = self.clock.now();
        let mut seen = Vec::with_capacity(tickers.len());
        for raw in tickers {
            let ticker = normalize_ticker(raw);
            if ticker.is_empty() || seen.contains(&ticker) {
                continue;
            }
            let entry = WatchlistEntry {
                ticker: ticker.clone(),
                company_name: None,
                added_at: now,
                sort_order: seen.len() as i64,
            };
            self.put(&entry).await?;
            seen.push(ticker);
        }

        tracing::info!("Saved watchlist with {} tickers", seen.len());
        Ok(())
    }

    /// Appends a ticker. Returns false if it was already present.
    pub async fn add(&self, ticker: &str, company_name: Option<String>) -> Result<bool, MarketError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(MarketError::InvalidRequest("ticker must not be empty".into()));
        }
        if self.store.get(Collection::Watchlist, &ticker).await?.is_some() {
            return Ok(false);
        }

        let last = self
            .store
            .scan(Collection::Watchlist, &|_| true)
            .await?
            .iter()
            .map(|r| r.sort_key)
            .max();
        let entry = WatchlistEntry {
            ticker,
            company_name,
            added_at: self.clock.now(),
            sort_order: last.map_or(0, |s| s + 1),
        };
        self.put(&entry).await?;
        tracing::info!("Added {} to watchlist", entry.ticker);
        Ok(true)
    }

    /// Returns false if the ticker was not on the list.
    pub async fn remove(&self, ticker: &str) -> Result<bool, MarketError> {
        let ticker = normalize_ticker(ticker);
        let removed = self.store.delete(Collection::Watchlist, &ticker).await?;
        if removed {
            tracing::info!("Removed {} from watchlist", ticker);
        }
        Ok(removed)
    }

    async fn put(&self, entry: &WatchlistEntry) -> Result<(), MarketError> {
        self.store
            .insert(Record {
                collection: Collection::Watchlist,
                key: entry.ticker.clone(),
                payload: serde_json::to_string(entry)?,
                sort_key: entry.sort_order,
                written_at: entry.added_at,
            })
            .await
    }
}
