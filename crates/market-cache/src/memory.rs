use async_trait::async_trait;
use dashmap::DashMap;
use market_core::MarketError;

use crate::record::{Collection, Record, RecordFilter, RecordStore};

/// Process-local store, used in tests and when no database is configured.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: DashMap<(Collection, String), Record>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: Record) -> Result<(), MarketError> {
        self.records.insert((record.collection, record.key.clone()), record);
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Record>, MarketError> {
        Ok(self
            .records
            .get(&(collection, key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn scan(&self, collection: Collection, filter: RecordFilter<'_>) -> Result<Vec<Record>, MarketError> {
        let mut matched: Vec<Record> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == collection && filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.key.cmp(&b.key)));
        Ok(matched)
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, MarketError> {
        Ok(self.records.remove(&(collection, key.to_string())).is_some())
    }

    async fn delete_all(&self, collection: Collection) -> Result<u64, MarketError> {
        let mut removed = 0u64;
        self.records.retain(|(c, _), _| {
            if *c == collection {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(collection: Collection, key: &str, sort_key: i64) -> Record {
        Record {
            collection,
            key: key.to_string(),
            payload: "{}".to_string(),
            sort_key,
            written_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = MemoryRecordStore::new();
        store.insert(record(Collection::Quote, "AAPL", 0)).await.unwrap();
        store.insert(record(Collection::Watchlist, "AAPL", 1)).await.unwrap();
        store.insert(record(Collection::Watchlist, "MSFT", 0)).await.unwrap();

        let keys: Vec<String> = store
            .scan(Collection::Watchlist, &|_| true)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["MSFT", "AAPL"]);

        assert_eq!(store.delete_all(Collection::Watchlist).await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.delete(Collection::Quote, "AAPL").await.unwrap());
        assert!(store.is_empty());
    }
}
