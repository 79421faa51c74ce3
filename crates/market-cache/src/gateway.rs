//! Durable read-through/write-through cache for quotes, price windows and
//! AI analyses.
//!
//! Storage failures never reach callers: a failed read is a miss and a
//! failed write is logged.

use chrono::{Duration, NaiveDate};
use market_core::{normalize_ticker, AiAnalysis, AiProvider, AnalysisKind, Clock, PriceHistory, Quote};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::record::{Collection, Record, RecordStore};

/// Quotes older than this are swept by [`CacheGateway::clear_expired`].
const QUOTE_SWEEP_SECS: i64 = 300;
/// Price windows older than this are swept.
const HISTORY_SWEEP_SECS: i64 = 3600;

/// Max-age per cache class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    pub quote_max_age: Duration,
    pub history_max_age: Duration,
    pub analysis_max_age: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            quote_max_age: Duration::seconds(60),
            history_max_age: Duration::seconds(300),
            analysis_max_age: Duration::seconds(3600),
        }
    }
}

impl CachePolicy {
    pub fn from_secs(quote: i64, history: i64, analysis: i64) -> Self {
        Self {
            quote_max_age: Duration::seconds(quote),
            history_max_age: Duration::seconds(history),
            analysis_max_age: Duration::seconds(analysis),
        }
    }
}

#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(store, clock, CachePolicy::default())
    }

    pub fn with_policy(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, policy: CachePolicy) -> Self {
        Self { store, clock, policy }
    }

    pub fn quote_key(ticker: &str) -> String {
        normalize_ticker(ticker)
    }

    pub fn history_key(ticker: &str, from: NaiveDate, to: NaiveDate) -> String {
        format!(
            "{}-{}-{}",
            normalize_ticker(ticker),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        )
    }

    pub fn analysis_key(ticker: &str, provider: AiProvider, kind: AnalysisKind) -> String {
        format!("{}-{}-{}", normalize_ticker(ticker), provider.as_str(), kind.as_str())
    }

    pub async fn quote(&self, ticker: &str) -> Option<Quote> {
        self.quote_within(ticker, self.policy.quote_max_age).await
    }

    pub async fn quote_within(&self, ticker: &str, max_age: Duration) -> Option<Quote> {
        self.read(Collection::Quote, &Self::quote_key(ticker), max_age).await
    }

    pub async fn put_quote(&self, quote: &Quote) {
        self.write(Collection::Quote, Self::quote_key(&quote.ticker), quote).await;
    }

    pub async fn history(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> Option<PriceHistory> {
        self.read(Collection::PriceHistory, &Self::history_key(ticker, from, to), self.policy.history_max_age)
            .await
    }

    pub async fn put_history(&self, ticker: &str, from: NaiveDate, to: NaiveDate, bars: &PriceHistory) {
        self.write(Collection::PriceHistory, Self::history_key(ticker, from, to), bars).await;
    }

    pub async fn analysis(&self, ticker: &str, provider: AiProvider, kind: AnalysisKind) -> Option<AiAnalysis> {
        self.read(
            Collection::AiAnalysis,
            &Self::analysis_key(ticker, provider, kind),
            self.policy.analysis_max_age,
        )
        .await
    }

    pub async fn put_analysis(&self, ticker: &str, provider: AiProvider, kind: AnalysisKind, analysis: &AiAnalysis) {
        self.write(Collection::AiAnalysis, Self::analysis_key(ticker, provider, kind), analysis)
            .await;
    }

    /// Removes quotes older than five minutes and price windows older than an
    /// hour. Returns the number of records removed.
    pub async fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        for (collection, limit) in [
            (Collection::Quote, Duration::seconds(QUOTE_SWEEP_SECS)),
            (Collection::PriceHistory, Duration::seconds(HISTORY_SWEEP_SECS)),
        ] {
            let stale = match self.store.scan(collection, &|r| now - r.written_at > limit).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!("Cache sweep of {} failed: {}", collection, e);
                    continue;
                }
            };
            for record in stale {
                match self.store.delete(collection, &record.key).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Failed to delete {}/{}: {}", collection, record.key, e),
                }
            }
        }

        if removed > 0 {
            tracing::info!("Cleared {} expired cache records", removed);
        }
        removed
    }

    async fn read<T: DeserializeOwned>(&self, collection: Collection, key: &str, max_age: Duration) -> Option<T> {
        let record = match self.store.get(collection, key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("Cache miss {}/{}", collection, key);
                return None;
            }
            Err(e) => {
                tracing::warn!("Cache read {}/{} failed, treating as miss: {}", collection, key, e);
                return None;
            }
        };

        let age = self.clock.now() - record.written_at;
        if age > max_age {
            tracing::debug!("Cache entry {}/{} expired ({}s old)", collection, key, age.num_seconds());
            return None;
        }

        match serde_json::from_str(&record.payload) {
            Ok(value) => {
                tracing::debug!("Cache hit {}/{}", collection, key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Cache entry {}/{} is unreadable, treating as miss: {}", collection, key, e);
                None
            }
        }
    }

    /// Deletes the superseded entry, then inserts the new one.
    async fn write<T: Serialize>(&self, collection: Collection, key: String, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode {}/{} for caching: {}", collection, key, e);
                return;
            }
        };

        if let Err(e) = self.store.delete(collection, &key).await {
            tracing::warn!("Failed to remove stale {}/{}: {}", collection, key, e);
        }

        let record = Record {
            collection,
            key,
            payload,
            sort_key: 0,
            written_at: self.clock.now(),
        };
        let key = record.key.clone();
        if let Err(e) = self.store.insert(record).await {
            tracing::warn!("Failed to cache {}/{}: {}", collection, key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;
    use crate::record::RecordFilter;
    use crate::sqlite::SqliteRecordStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use market_core::{ManualClock, MarketError, PriceBar, Sentiment};
    use uuid::Uuid;

    /// Fails every operation.
    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        async fn insert(&self, _record: Record) -> Result<(), MarketError> {
            Err(MarketError::Storage("disk full".into()))
        }
        async fn get(&self, _c: Collection, _k: &str) -> Result<Option<Record>, MarketError> {
            Err(MarketError::Storage("disk gone".into()))
        }
        async fn scan(&self, _c: Collection, _f: RecordFilter<'_>) -> Result<Vec<Record>, MarketError> {
            Err(MarketError::Storage("disk gone".into()))
        }
        async fn delete(&self, _c: Collection, _k: &str) -> Result<bool, MarketError> {
            Err(MarketError::Storage("disk gone".into()))
        }
        async fn delete_all(&self, _c: Collection) -> Result<u64, MarketError> {
            Err(MarketError::Storage("disk gone".into()))
        }
    }

    fn sample_quote(clock: &ManualClock) -> Quote {
        Quote {
            ticker: "AAPL".into(),
            company_name: "Apple Inc.".into(),
            current_price: 182.52,
            daily_change: 2.34,
            daily_change_percent: 1.2987012987012987,
            volume: 52_430_000,
            average_volume: Some(58_000_000),
            previous_close: 180.18,
            open: 180.5,
            week52_high: Some(199.62),
            week52_low: Some(164.08),
            market_cap: Some(2.85e12),
            pe_ratio: Some(29.5),
            post_market_change: None,
            last_updated: clock.now(),
        }
    }

    fn start() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap())
    }

    #[tokio::test]
    async fn test_quote_roundtrip_and_expiry() {
        let clock = start();
        let gateway = CacheGateway::new(Arc::new(MemoryRecordStore::new()), Arc::new(clock.clone()));
        let quote = sample_quote(&clock);
        gateway.put_quote(&quote).await;

        clock.advance(Duration::seconds(60));
        assert_eq!(gateway.quote("aapl").await, Some(quote.clone()));

        clock.advance(Duration::seconds(1));
        assert_eq!(gateway.quote("AAPL").await, None);
        // A longer max-age still sees it.
        assert_eq!(gateway.quote_within("AAPL", Duration::seconds(300)).await, Some(quote));
    }

    #[tokio::test]
    async fn test_quote_roundtrip_through_sqlite_is_exact() {
        let clock = start();
        let store = SqliteRecordStore::connect("sqlite::memory:").await.unwrap();
        let gateway = CacheGateway::new(Arc::new(store), Arc::new(clock.clone()));
        let quote = Quote {
            current_price: 0.1 + 0.2,
            daily_change_percent: 1.0 / 3.0,
            ..sample_quote(&clock)
        };
        gateway.put_quote(&quote).await;
        assert_eq!(gateway.quote("AAPL").await, Some(quote));
    }

    #[tokio::test]
    async fn test_history_uses_window_key() {
        let clock = start();
        let gateway = CacheGateway::new(Arc::new(MemoryRecordStore::new()), Arc::new(clock.clone()));
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let bars = vec![PriceBar { date: from, open: 1.0, high: 2.0, low: 0.5, close: 1.5, volume: 10 }];

        gateway.put_history("msft", from, to, &bars).await;
        assert_eq!(gateway.history("MSFT", from, to).await, Some(bars));
        assert_eq!(gateway.history("MSFT", from, to - Duration::days(1)).await, None);

        clock.advance(Duration::seconds(301));
        assert_eq!(gateway.history("MSFT", from, to).await, None);
    }

    #[tokio::test]
    async fn test_analysis_keyed_by_provider_and_kind() {
        let clock = start();
        let gateway = CacheGateway::new(Arc::new(MemoryRecordStore::new()), Arc::new(clock.clone()));
        let analysis = AiAnalysis {
            id: Uuid::nil(),
            ticker: "AAPL".into(),
            kind: AnalysisKind::Week,
            summary: "s".into(),
            sentiment: Sentiment::Bullish,
            key_points: vec!["k".into()],
            patterns: vec![],
            technical_levels: vec![],
            recommendation: "r".into(),
            confidence: 0.8,
            provider: AiProvider::Cloud,
            fetched_at: clock.now(),
        };
        gateway.put_analysis("AAPL", AiProvider::Cloud, AnalysisKind::Week, &analysis).await;

        assert_eq!(gateway.analysis("AAPL", AiProvider::Cloud, AnalysisKind::Week).await, Some(analysis));
        assert_eq!(gateway.analysis("AAPL", AiProvider::Mock, AnalysisKind::Week).await, None);
        assert_eq!(gateway.analysis("AAPL", AiProvider::Cloud, AnalysisKind::Month).await, None);

        clock.advance(Duration::seconds(3601));
        assert_eq!(gateway.analysis("AAPL", AiProvider::Cloud, AnalysisKind::Week).await, None);
        assert_eq!(
            CacheGateway::analysis_key("aapl", AiProvider::OnDevice, AnalysisKind::Month),
            "AAPL-on-device-month"
        );
    }

    #[tokio::test]
    async fn test_storage_failures_are_misses() {
        let clock = start();
        let gateway = CacheGateway::new(Arc::new(BrokenStore), Arc::new(clock.clone()));
        gateway.put_quote(&sample_quote(&clock)).await;
        assert_eq!(gateway.quote("AAPL").await, None);
        assert_eq!(gateway.clear_expired().await, 0);
    }

    #[tokio::test]
    async fn test_clear_expired_sweeps_by_class() {
        let clock = start();
        let store = Arc::new(MemoryRecordStore::new());
        let gateway = CacheGateway::new(store.clone(), Arc::new(clock.clone()));
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        gateway.put_quote(&sample_quote(&clock)).await;
        gateway.put_history("AAPL", day, day, &vec![]).await;
        clock.advance(Duration::seconds(301));
        gateway.put_quote(&Quote { ticker: "MSFT".into(), ..sample_quote(&clock) }).await;

        // Old quote goes, history (under an hour) and fresh quote stay.
        assert_eq!(gateway.clear_expired().await, 1);
        assert_eq!(store.len(), 2);

        clock.advance(Duration::seconds(3600));
        assert_eq!(gateway.clear_expired().await, 2);
        assert!(store.is_empty());
    }
}
