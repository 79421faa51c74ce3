use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::MarketError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Watchlist,
    Quote,
    PriceHistory,
    AiAnalysis,
    RecentSearch,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Watchlist => "watchlist",
            Collection::Quote => "quote",
            Collection::PriceHistory => "price_history",
            Collection::AiAnalysis => "ai_analysis",
            Collection::RecentSearch => "recent_search",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored row: a JSON payload under `(collection, key)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub collection: Collection,
    pub key: String,
    pub payload: String,
    pub sort_key: i64,
    pub written_at: DateTime<Utc>,
}

pub type RecordFilter<'a> = &'a (dyn Fn(&Record) -> bool + Send + Sync);

/// Keyed persistence boundary.
///
/// Writes for the same key are last-writer-wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: Record) -> Result<(), MarketError>;

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Record>, MarketError>;

    /// Matching records ordered by `sort_key`, then key.
    async fn scan(&self, collection: Collection, filter: RecordFilter<'_>) -> Result<Vec<Record>, MarketError>;

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, MarketError>;

    async fn delete_all(&self, collection: Collection) -> Result<u64, MarketError>;
}
