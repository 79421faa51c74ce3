use market_cache::{Collection, Record, RecordStore};
use market_core::{Clock, MarketError, SearchResult};
use std::sync::Arc;

pub const MAX_RECENT_SEARCHES: usize = 15;
const RECORD_KEY: &str = "recent";

/// Most-recent-first list of selected search results, persisted as one record.
#[derive(Clone)]
pub struct RecentSearches {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl RecentSearches {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self) -> Result<Vec<SearchResult>, MarketError> {
        match self.store.get(Collection::RecentSearch, RECORD_KEY).await? {
            Some(record) => Ok(serde_json::from_str(&record.payload)?),
            None => Ok(Vec::new()),
        }
    }

    /// Moves `result` to the front, dropping any older entry for the ticker.
    pub async fn remember(&self, result: SearchResult) -> Result<Vec<SearchResult>, MarketError> {
        let mut recent = self.list().await.unwrap_or_else(|e| {
            tracing::warn!("Recent searches unreadable, starting fresh: {}", e);
            Vec::new()
        });
        recent.retain(|r| r.ticker != result.ticker);
        recent.insert(0, result);
        recent.truncate(MAX_RECENT_SEARCHES);
        self.save(&recent).await?;
        Ok(recent)
    }

    pub async fn clear(&self) -> Result<(), MarketError> {
        self.store.delete(Collection::RecentSearch, RECORD_KEY).await?;
        Ok(())
    }

    async fn save(&self, recent: &[SearchResult]) -> Result<(), MarketError> {
        self.store
            .insert(Record {
                collection: Collection::RecentSearch,
                key: RECORD_KEY.to_string(),
                payload: serde_json::to_string(recent)?,
                sort_key: 0,
                written_at: self.clock.now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_cache::MemoryRecordStore;
    use market_core::SystemClock;

    fn recent() -> RecentSearches {
        RecentSearches::new(Arc::new(MemoryRecordStore::new()), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_most_recent_first_without_duplicates() {
        let recent = recent();
        recent.remember(SearchResult::us_stock("AAPL", "Apple Inc.")).await.unwrap();
        recent.remember(SearchResult::us_stock("MSFT", "Microsoft")).await.unwrap();
        let list = recent.remember(SearchResult::us_stock("AAPL", "Apple Inc.")).await.unwrap();

        let tickers: Vec<_> = list.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, ["AAPL", "MSFT"]);
        assert_eq!(recent.list().await.unwrap(), list);
    }

    #[tokio::test]
    async fn test_capped_and_clearable() {
        let recent = recent();
        for i in 0..20 {
            recent.remember(SearchResult::us_stock(format!("T{}", i), "x")).await.unwrap();
        }
        let list = recent.list().await.unwrap();
        assert_eq!(list.len(), MAX_RECENT_SEARCHES);
        assert_eq!(list[0].ticker, "T19");
        assert_eq!(list[14].ticker, "T5");

        recent.clear().await.unwrap();
        assert!(recent.list().await.unwrap().is_empty());
    }
}
