//! Twelve Data adapter: first choice for daily history, second for quotes.
//!
//! Numbers arrive as strings, and API errors arrive inside HTTP 200 bodies as
//! `{"status":"error","code":N,"message":...}`.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use market_core::{
    normalize_history, normalize_ticker, require_key, Clock, MacdValue, MarketError, PriceBar,
    PriceHistory, Quote, SearchResult, StockDataService, TWELVE_DATA_API_KEY,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::cache::AdapterCache;
use crate::http::{map_status, HttpClient};

const BASE_URL: &str = "https://api.twelvedata.com";
const PROVIDER_ID: &str = "twelve_data";
const DEFAULT_RATE_LIMIT: usize = 8;
const MAX_OUTPUT_SIZE: i64 = 5000;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    symbol: Option<String>,
    name: Option<String>,
    open: Option<String>,
    close: Option<String>,
    previous_close: Option<String>,
    volume: Option<String>,
    average_volume: Option<String>,
    fifty_two_week: Option<FiftyTwoWeek>,
}

#[derive(Debug, Deserialize)]
struct FiftyTwoWeek {
    high: Option<String>,
    low: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    values: Vec<TimeSeriesValue>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: Option<String>,
    open: Option<String>,
    high: Option<String>,
    low: Option<String>,
    close: Option<String>,
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolSearchResponse {
    #[serde(default)]
    data: Vec<SymbolSearchItem>,
}

#[derive(Debug, Deserialize)]
struct SymbolSearchItem {
    symbol: String,
    instrument_name: Option<String>,
    exchange: Option<String>,
    instrument_type: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndicatorResponse<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RsiValue {
    rsi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MacdRow {
    macd: Option<String>,
    macd_signal: Option<String>,
    macd_hist: Option<String>,
}

pub struct TwelveDataClient {
    api_key: Option<String>,
    base_url: String,
    http: HttpClient,
    cache: AdapterCache,
    clock: Arc<dyn Clock>,
}

impl TwelveDataClient {
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
        let key = require_key(self.api_key.as_deref(), TWELVE_DATA_API_KEY)?;
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("Twelve Data request: {}", endpoint);
        let request = self.http.get(&url).query(params).query(&[("apikey", key)]);
        let body: Value = self.http.send_json(request).await?;
        check_body(&body)?;
        Ok(serde_json::from_value(body)?)
    }
}

/// Surfaces errors that Twelve Data reports with a 200 status.
fn check_body(body: &Value) -> Result<(), MarketError> {
    if body.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(());
    }
    let code = body
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(500);
    Err(map_status(PROVIDER_ID, code, &body.to_string()))
}

fn num(raw: &Option<String>) -> Option<f64> {
    raw.as_deref().and_then(|s| s.trim().parse::<f64>().ok()).filter(|v| v.is_finite())
}

fn volume(raw: &Option<String>) -> Option<u64> {
    num(raw).map(|v| v.max(0.0) as u64)
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok().map(|dt| dt.date()))
}

fn to_quote(ticker: &str, raw: QuoteResponse, now: chrono::DateTime<chrono::Utc>) -> Result<Quote, MarketError> {
    let current = num(&raw.close).ok_or_else(|| {
        MarketError::MalformedUpstreamResponse(format!("{}: quote for {} has no close", PROVIDER_ID, ticker))
    })?;
    let previous_close = num(&raw.previous_close).unwrap_or(current);
    let change = current - previous_close;
    let change_percent = if previous_close > 0.0 { change / previous_close * 100.0 } else { 0.0 };
    let range = raw.fifty_two_week.as_ref();

    Ok(Quote {
        ticker: raw.symbol.map(|s| normalize_ticker(&s)).unwrap_or_else(|| ticker.to_string()),
        company_name: raw.name.filter(|n| !n.is_empty()).unwrap_or_else(|| ticker.to_string()),
        current_price: current,
        daily_change: change,
        daily_change_percent: change_percent,
        volume: volume(&raw.volume).unwrap_or(0),
        average_volume: volume(&raw.average_volume),
        previous_close,
        open: num(&raw.open).unwrap_or(current),
        week52_high: range.and_then(|r| num(&r.high)),
        week52_low: range.and_then(|r| num(&r.low)),
        market_cap: None,
        pe_ratio: None,
        post_market_change: None,
        last_updated: now,
    })
}

/// Rows arrive newest first; bad rows are skipped.
fn to_bars(ticker: &str, raw: TimeSeriesResponse, from: NaiveDate, to: NaiveDate) -> Result<PriceHistory, MarketError> {
    if raw.values.is_empty() {
        return Err(MarketError::UpstreamNotFound(format!("{}: no time series for {}", PROVIDER_ID, ticker)));
    }

    let bars: Vec<PriceBar> = raw
        .values
        .iter()
        .filter_map(|row| {
            Some(PriceBar {
                date: parse_day(row.datetime.as_deref()?)?,
                open: num(&row.open)?,
                high: num(&row.high)?,
                low: num(&row.low)?,
                close: num(&row.close)?,
                volume: volume(&row.volume).unwrap_or(0),
            })
        })
        .filter(|b| b.date >= from && b.date <= to)
        .collect();

    Ok(normalize_history(bars))
}

fn to_search_results(raw: SymbolSearchResponse) -> Vec<SearchResult> {
    raw.data
        .into_iter()
        .map(|item| {
            let name = item.instrument_name.unwrap_or_else(|| item.symbol.clone());
            let mut result = SearchResult::us_stock(item.symbol, name);
            result.primary_exchange = item.exchange;
            if let Some(kind) = item.instrument_type {
                result.instrument_type = kind;
            }
            if let Some(country) = item.country.filter(|c| c != "United States") {
                result.locale = country.to_lowercase();
            }
            result
        })
        .collect()
}

#[async_trait]
impl StockDataService for TwelveDataClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, MarketError> {
        let ticker = normalize_ticker(ticker);
        if let Some(cached) = self.cache.quote(&ticker) {
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

        let days = (to - from).num_days().max(0);
        let output_size = (days + 5).min(MAX_OUTPUT_SIZE).to_string();
        let raw: TimeSeriesResponse = self
            .fetch(
                "/time_series",
                &[
                    ("symbol", ticker.as_str()),
                    ("interval", "1day"),
                    ("outputsize", output_size.as_str()),
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
        let raw: SymbolSearchResponse = self.fetch("/symbol_search", &[("symbol", query)]).await?;
        Ok(to_search_results(raw))
    }

    async fn get_details(&self, ticker: &str) -> Result<Quote, MarketError> {
        self.get_quote(ticker).await
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn remote_rsi(&self, ticker: &str, period: usize) -> Result<f64, MarketError> {
        let ticker = normalize_ticker(ticker);
        let period = period.to_string();
        let raw: IndicatorResponse<RsiValue> = self
            .fetch(
                "/rsi",
                &[("symbol", ticker.as_str()), ("interval", "1day"), ("time_period", period.as_str())],
            )
            .await?;
        raw.values
            .first()
            .and_then(|v| num(&v.rsi))
            .ok_or_else(|| MarketError::MalformedUpstreamResponse(format!("{}: empty RSI series", PROVIDER_ID)))
    }

    async fn remote_macd(&self, ticker: &str) -> Result<MacdValue, MarketError> {
        let ticker = normalize_ticker(ticker);
        let raw: IndicatorResponse<MacdRow> = self
            .fetch("/macd", &[("symbol", ticker.as_str()), ("interval", "1day")])
            .await?;
        raw.values
            .first()
            .and_then(|row| {
                Some(MacdValue {
                    line: num(&row.macd)?,
                    signal: num(&row.macd_signal)?,
                    histogram: num(&row.macd_hist)?,
                })
            })
            .ok_or_else(|| MarketError::MalformedUpstreamResponse(format!("{}: empty MACD series", PROVIDER_ID)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_core::{ErrorKind, ManualClock};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TwelveDataClient {
        TwelveDataClient::new(Some("td-key".into()), Arc::new(ManualClock::new(Utc::now())))
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_quote_parses_string_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("apikey", "td-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"symbol":"AAPL","name":"Apple Inc","open":"180.50","close":"182.52","previous_close":"180.18",
                    "volume":"52430000","average_volume":"58000000","fifty_two_week":{"high":"199.62","low":"164.08"}}"#,
            ))
            .mount(&server)
            .await;

        let quote = client(&server).get_quote("AAPL").await.unwrap();
        assert_eq!(quote.company_name, "Apple Inc");
        assert_eq!(quote.current_price, 182.52);
        assert_eq!(quote.previous_close, 180.18);
        assert_eq!(quote.volume, 52_430_000);
        assert_eq!(quote.average_volume, Some(58_000_000));
        assert_eq!(quote.week52_high, Some(199.62));
        assert_eq!(quote.week52_low, Some(164.08));
    }

    #[tokio::test]
    async fn test_error_inside_ok_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"code":429,"message":"You have run out of API credits","status":"error"}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/time_series"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"code":404,"message":"symbol not found","status":"error"}"#,
            ))
            .mount(&server)
            .await;

        let td = client(&server);
        let err = td.get_quote("AAPL").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamRateLimited);

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = td.get_history("NOPE", day, day).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamNotFound);
    }

    #[tokio::test]
    async fn test_time_series_sorted_filtered_and_cleaned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/time_series"))
            .and(query_param("interval", "1day"))
            .and(query_param("outputsize", "14"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"meta":{"symbol":"AAPL"},"values":[
                    {"datetime":"2024-01-10","open":"3","high":"3","low":"3","close":"3","volume":"30"},
                    {"datetime":"2024-01-09","open":"x","high":"2","low":"2","close":"2","volume":"20"},
                    {"datetime":"2024-01-08","open":"1","high":"1","low":"1","close":"1","volume":"10"},
                    {"datetime":"2023-12-29","open":"0.5","high":"0.5","low":"0.5","close":"0.5","volume":"5"}
                ],"status":"ok"}"#,
            ))
            .mount(&server)
            .await;

        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let bars = client(&server).get_history("AAPL", from, to).await.unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 3.0]);
    }

    #[tokio::test]
    async fn test_symbol_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/symbol_search"))
            .and(query_param("symbol", "micro"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data":[{"symbol":"MSFT","instrument_name":"Microsoft Corp","exchange":"NASDAQ",
                    "instrument_type":"Common Stock","country":"United States"}],"status":"ok"}"#,
            ))
            .mount(&server)
            .await;

        let results = client(&server).search("micro").await.unwrap();
        assert_eq!(results[0].ticker, "MSFT");
        assert_eq!(results[0].name, "Microsoft Corp");
        assert_eq!(results[0].primary_exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(results[0].locale, "us");
    }

    #[tokio::test]
    async fn test_remote_indicators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rsi"))
            .and(query_param("time_period", "14"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"values":[{"datetime":"2024-01-10","rsi":"61.25"},{"datetime":"2024-01-09","rsi":"58.00"}]}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/macd"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"values":[{"datetime":"2024-01-10","macd":"1.5","macd_signal":"1.0","macd_hist":"0.5"}]}"#,
            ))
            .mount(&server)
            .await;

        let td = client(&server);
        assert_eq!(td.remote_rsi("AAPL", 14).await.unwrap(), 61.25);
        let macd = td.remote_macd("AAPL").await.unwrap();
        assert_eq!(macd, MacdValue { line: 1.5, signal: 1.0, histogram: 0.5 });
    }
}
