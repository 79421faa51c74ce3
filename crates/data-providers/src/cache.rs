use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use market_core::{Clock, PriceHistory, Quote};
use std::sync::Arc;

/// Default lifetime of an adapter-local entry, matching the quote cache.
pub const ADAPTER_CACHE_TTL_SECS: i64 = 60;

struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Short-lived per-adapter response cache. Never shared between adapters.
pub struct AdapterCache {
    quotes: DashMap<String, CacheEntry<Quote>>,
    histories: DashMap<String, CacheEntry<PriceHistory>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AdapterCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, ADAPTER_CACHE_TTL_SECS)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl_secs: i64) -> Self {
        Self {
            quotes: DashMap::new(),
            histories: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
            clock,
        }
    }

    pub fn history_key(ticker: &str, from: NaiveDate, to: NaiveDate) -> String {
        format!("{}-{}-{}", ticker, from.format("%Y-%m-%d"), to.format("%Y-%m-%d"))
    }

    pub fn quote(&self, ticker: &str) -> Option<Quote> {
        let entry = self.quotes.get(ticker)?;
        self.fresh(entry.cached_at).then(|| entry.data.clone())
    }

    pub fn store_quote(&self, quote: &Quote) {
        self.quotes.insert(
            quote.ticker.clone(),
            CacheEntry { data: quote.clone(), cached_at: self.clock.now() },
        );
    }

    pub fn history(&self, key: &str) -> Option<PriceHistory> {
        let entry = self.histories.get(key)?;
        self.fresh(entry.cached_at).then(|| entry.data.clone())
    }

    pub fn store_history(&self, key: String, bars: &PriceHistory) {
        self.histories.insert(key, CacheEntry { data: bars.clone(), cached_at: self.clock.now() });
    }

    pub fn clear(&self) {
        self.quotes.clear();
        self.histories.clear();
    }

    fn fresh(&self, cached_at: DateTime<Utc>) -> bool {
        self.clock.now() - cached_at < self.ttl
    }
}
