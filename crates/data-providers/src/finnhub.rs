//! Finnhub adapter: first choice for quotes, details and search.
//!
//! Endpoints: `/quote`, `/stock/candle`, `/search`, `/stock/profile2`.
//! Free tier allows 60 calls per minute.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use market_core::{
    normalize_history, normalize_ticker, require_key, Clock, MarketError, PriceBar, PriceHistory,
    Quote, SearchResult, StockDataService, FINNHUB_API_KEY,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use crate::cache::AdapterCache;
use crate::http::HttpClient;

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "finnhub";
const DEFAULT_RATE_LIMIT: usize = 60;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Previous close
    pc: Option<f64>,
    /// Volume, only on some plans
    #[serde(default)]
    v: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// "ok" or "no_data"
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    description: String,
    symbol: String,
    #[serde(rename = "type", default)]
    security_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    name: Option<String>,
    exchange: Option<String>,
    /// Reported in millions
    market_capitalization: Option<f64>,
}

pub struct FinnhubClient {
    api_key: Option<String>,
    base_url: String,
    http: HttpClient,
    cache: AdapterCache,
    clock: Arc<dyn Clock>,
}

impl FinnhubClient {
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
        let key = require_key(self.api_key.as_deref(), FINNHUB_API_KEY)?;
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("Finnhub request: {}", endpoint);
        let request = self.http.get(&url).header("X-Finnhub-Token", key).query(params);
        self.http.send_json(request).await
    }
}

fn to_quote(ticker: &str, raw: QuoteResponse, now: DateTime<Utc>) -> Result<Quote, MarketError> {
    let current = raw.c.unwrap_or(0.0);
    let previous_close = raw.pc.unwrap_or(0.0);
    // Unknown symbols come back as all zeros.
    if current == 0.0 && previous_close == 0.0 {
        return Err(MarketError::UpstreamNotFound(format!("{}: no quote for {}", PROVIDER_ID, ticker)));
    }

    let change = current - previous_close;
    let change_percent = if previous_close != 0.0 { change / previous_close * 100.0 } else { 0.0 };

    Ok(Quote {
        ticker: ticker.to_string(),
        company_name: ticker.to_string(),
        current_price: current,
        daily_change: change,
        daily_change_percent: change_percent,
        volume: raw.v.unwrap_or(0.0).max(0.0) as u64,
        average_volume: None,
        previous_close,
        open: raw.o.unwrap_or(current),
        week52_high: None,
        week52_low: None,
        market_cap: None,
        pe_ratio: None,
        post_market_change: None,
        last_updated: now,
    })
}

fn to_bars(ticker: &str, raw: CandleResponse, from: NaiveDate, to: NaiveDate) -> Result<PriceHistory, MarketError> {
    match raw.s.as_str() {
        "ok" => {}
        "no_data" => {
            return Err(MarketError::UpstreamNotFound(format!("{}: no candles for {}", PROVIDER_ID, ticker)))
        }
        other => {
            return Err(MarketError::MalformedUpstreamResponse(format!(
                "{}: unexpected candle status '{}'",
                PROVIDER_ID, other
            )))
        }
    }

    let len = [raw.t.len(), raw.o.len(), raw.h.len(), raw.l.len(), raw.c.len(), raw.v.len()]
        .into_iter()
        .min()
        .unwrap_or(0);

    let bars: Vec<PriceBar> = (0..len)
        .filter_map(|i| {
            let date = DateTime::from_timestamp(raw.t[i], 0)?.date_naive();
            Some(PriceBar {
                date,
                open: raw.o[i],
                high: raw.h[i],
                low: raw.l[i],
                close: raw.c[i],
                volume: raw.v[i].max(0.0) as u64,
            })
        })
        .filter(|b| b.date >= from && b.date <= to)
        .collect();

    if bars.is_empty() {
        return Err(MarketError::UpstreamNotFound(format!("{}: no candles for {}", PROVIDER_ID, ticker)));
    }
    Ok(normalize_history(bars))
}

fn to_search_results(raw: SearchResponse) -> Vec<SearchResult> {
    raw.result
        .into_iter()
        .map(|item| {
            let mut result = SearchResult::us_stock(item.symbol, item.description);
            if !item.security_type.is_empty() {
                result.instrument_type = item.security_type;
            }
            result
        })
        .collect()
}

#[async_trait]
impl StockDataService for FinnhubClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, MarketError> {
        let ticker = normalize_ticker(ticker);
        if let Some(cached) = self.cache.quote(&ticker) {
            tracing::debug!("Finnhub cache hit for {}", ticker);
            return Ok(cached);
        }

        let raw: QuoteResponse = self.fetch("/quote", &[("symbol", ticker.as_str())]).await?;
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

        let from_ts = from.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp()).unwrap_or(0);
        let to_ts = to
            .and_hms_opt(23, 59, 59)
            .map(|d| d.and_utc().timestamp())
            .unwrap_or(from_ts);
        let (from_param, to_param) = (from_ts.to_string(), to_ts.to_string());
        let raw: CandleResponse = self
            .fetch(
                "/stock/candle",
                &[
                    ("symbol", ticker.as_str()),
                    ("resolution", "D"),
                    ("from", from_param.as_str()),
                    ("to", to_param.as_str()),
                ],
            )
            .await?;

        let bars = to_bars(&ticker, raw, from, to)?;
        self.cache.store_history(key, &bars);
        Ok(bars)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }
        let raw: SearchResponse = self.fetch("/search", &[("q", query)]).await?;
        Ok(to_search_results(raw))
    }

    async fn get_details(&self, ticker: &str) -> Result<Quote, MarketError> {
        let quote = self.get_quote(ticker).await?;
        let profile: ProfileResponse = self.fetch("/stock/profile2", &[("symbol", quote.ticker.as_str())]).await?;

        let company_name = profile
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| quote.company_name.clone());
        if let Some(exchange) = &profile.exchange {
            tracing::debug!("Finnhub profile for {} lists exchange {}", quote.ticker, exchange);
        }

        Ok(Quote {
            company_name,
            market_cap: profile.market_capitalization.map(|m| m * 1_000_000.0),
            ..quote
        })
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}
