//! Polygon.io adapter, the last resort in every chain.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use market_core::{
    normalize_history, normalize_ticker, require_key, Clock, MarketError, PriceBar, PriceHistory,
    Quote, SearchResult, StockDataService, POLYGON_API_KEY,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use crate::cache::AdapterCache;
use crate::http::HttpClient;

const BASE_URL: &str = "https://api.polygon.io";
const PROVIDER_ID: &str = "polygon";
/// Free tier budget.
const DEFAULT_RATE_LIMIT: usize = 5;
const SEARCH_LIMIT: &str = "10";

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
    /// Unix millis
    t: i64,
}

#[derive(Debug, Deserialize)]
struct TickerSearchResponse {
    #[serde(default)]
    results: Vec<TickerSearchItem>,
}

#[derive(Debug, Deserialize)]
struct TickerSearchItem {
    ticker: String,
    name: String,
    market: Option<String>,
    locale: Option<String>,
    primary_exchange: Option<String>,
    #[serde(rename = "type")]
    ticker_type: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: Option<TickerDetails>,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    name: Option<String>,
    market_cap: Option<f64>,
}

pub struct PolygonClient {
    api_key: Option<String>,
    base_url: String,
    http: HttpClient,
    cache: AdapterCache,
    clock: Arc<dyn Clock>,
}

impl PolygonClient {
    pub fn new(api_key: Option<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: BASE_URL.to_string(),
            http: HttpClient::new(PROVIDER_ID, DEFAULT_RATE_LIMIT),
            cache: AdapterCache::new(clock.clone()),
            clock,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_rate_limit(mut self, requests_per_minute: usize) -> Self {
        self.http = HttpClient::new(PROVIDER_ID, requests_per_minute);
        self
    }

    /// Local cache lifetime; keep it equal to the persistent quote max-age.
    pub fn with_cache_ttl(mut self, ttl_secs: i64) -> Self {
        self.cache = AdapterCache::with_ttl(self.clock.clone(), ttl_secs);
        self
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, MarketError> {
        let key = require_key(self.api_key.as_deref(), POLYGON_API_KEY)?;
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("Polygon request: {}", endpoint);
        let request = self.http.get(&url).query(params).query(&[("apiKey", key)]);
        self.http.send_json(request).await
    }
}

/// Previous session bar as a quote. Change is measured close minus open.
fn to_quote(ticker: &str, raw: AggregateResponse, now: chrono::DateTime<chrono::Utc>) -> Result<Quote, MarketError> {
    let bar = raw
        .results
        .first()
        .ok_or_else(|| MarketError::UpstreamNotFound(format!("{}: no previous close for {}", PROVIDER_ID, ticker)))?;

    let change = bar.c - bar.o;
    let change_percent = if bar.o != 0.0 { change / bar.o * 100.0 } else { 0.0 };

    Ok(Quote {
        ticker: ticker.to_string(),
        company_name: ticker.to_string(),
        current_price: bar.c,
        daily_change: change,
        daily_change_percent: change_percent,
        volume: bar.v.max(0.0) as u64,
        average_volume: None,
        previous_close: bar.c,
        open: bar.o,
        week52_high: None,
        week52_low: None,
        market_cap: None,
        pe_ratio: None,
        post_market_change: None,
        last_updated: now,
    })
}

fn to_bars(raw: AggregateResponse, from: NaiveDate, to: NaiveDate) -> PriceHistory {
    let bars = raw
        .results
        .into_iter()
        .filter_map(|r| {
            Some(PriceBar {
                date: DateTime::from_timestamp_millis(r.t)?.date_naive(),
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v.max(0.0) as u64,
            })
        })
        .filter(|b| b.date >= from && b.date <= to)
        .collect();
    normalize_history(bars)
}

fn to_search_results(raw: TickerSearchResponse) -> Vec<SearchResult> {
    raw.results
        .into_iter()
        .map(|item| SearchResult {
            ticker: item.ticker,
            name: item.name,
            market: item.market.unwrap_or_else(|| "stocks".to_string()),
            locale: item.locale.unwrap_or_else(|| "us".to_string()),
            primary_exchange: item.primary_exchange,
            instrument_type: item.ticker_type.unwrap_or_else(|| "CS".to_string()),
            active: item.active,
        })
        .collect()
}

#[async_trait]
impl StockDataService for PolygonClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, MarketError> {
        let ticker = normalize_ticker(ticker);
        if let Some(cached) = self.cache.quote(&ticker) {
            return Ok(cached);
        }

        let endpoint = format!("/v2/aggs/ticker/{}/prev", ticker);
        let raw: AggregateResponse = self.fetch(&endpoint, &[("adjusted", "true")]).await?;
        let quote = to_quote(&ticker, raw, self.clock.now())?;
        self.cache.store_quote(&quote);
        Ok(quote)
    }

    async fn get_history(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<PriceHistory, MarketError> {
        let ticker = normalize_ticker(ticker);
        let key = AdapterCache::history_key(&ticker, from, to);
        if let Some(cached) = self.cache.history(&key) {
            return Ok(cached);
        }

        let endpoint = format!(
            "/v2/aggs/ticker/{}/range/1/day/{}/{}",
            ticker,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );
        let raw: AggregateResponse = self
            .fetch(&endpoint, &[("adjusted", "true"), ("sort", "asc"), ("limit", "50000")])
            .await?;

        let bars = to_bars(raw, from, to);
        if bars.is_empty() {
            return Err(MarketError::UpstreamNotFound(format!("{}: no bars for {}", PROVIDER_ID, ticker)));
        }
        self.cache.store_history(key, &bars);
        Ok(bars)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }
        let raw: TickerSearchResponse = self
            .fetch(
                "/v3/reference/tickers",
                &[("search", query), ("active", "true"), ("limit", SEARCH_LIMIT)],
            )
            .await?;
        Ok(to_search_results(raw))
    }

    async fn get_details(&self, ticker: &str) -> Result<Quote, MarketError> {
        let quote = self.get_quote(ticker).await?;
        let endpoint = format!("/v3/reference/tickers/{}", quote.ticker);
        let raw: TickerDetailsResponse = self.fetch(&endpoint, &[]).await?;
        let details = raw.results;

        Ok(Quote {
            company_name: details
                .as_ref()
                .and_then(|d| d.name.clone())
                .unwrap_or_else(|| quote.company_name.clone()),
            market_cap: details.and_then(|d| d.market_cap).or(quote.market_cap),
            ..quote
        })
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}
