//! Stub services shared by the orchestrator tests.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use dashmap::DashMap;
use market_core::{
    AiAnalysis, AiProvider, AiService, AnalysisKind, IndicatorBundle, LevelKind, ManualClock,
    MarketError, Pattern, PriceBar, PriceHistory, Quote, SearchResult, Sentiment, StockDataService,
    TechnicalLevel,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap())
}

pub fn quote(ticker: &str, price: f64) -> Quote {
    Quote {
        ticker: ticker.to_string(),
        company_name: format!("{} Inc.", ticker),
        current_price: price,
        daily_change: 1.0,
        daily_change_percent: 1.0,
        volume: 1_000_000,
        average_volume: None,
        previous_close: price - 1.0,
        open: price - 0.5,
        week52_high: None,
        week52_low: None,
        market_cap: None,
        pe_ratio: None,
        post_market_change: None,
        last_updated: Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap(),
    }
}

/// Daily closes rising by one from `first`.
pub fn bars(from: NaiveDate, count: usize, first: f64) -> PriceHistory {
    (0..count)
        .map(|i| {
            let close = first + i as f64;
            PriceBar {
                date: from + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000,
            }
        })
        .collect()
}

/// Market-data stub: known tickers answer, everything else is not found.
#[derive(Default)]
pub struct StubData {
    pub quotes: DashMap<String, f64>,
    pub failing: Mutex<HashSet<String>>,
    pub quote_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub cleared: AtomicUsize,
}

impl StubData {
    pub fn with(tickers: &[(&str, f64)]) -> Self {
        let stub = Self::default();
        for (ticker, price) in tickers {
            stub.quotes.insert(ticker.to_string(), *price);
        }
        stub
    }

    pub fn fail(&self, ticker: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(ticker.to_string());
        }
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, ticker: &str) -> Result<f64, MarketError> {
        if self.failing.lock().map(|f| f.contains(ticker)).unwrap_or(false) {
            return Err(MarketError::UpstreamUnavailable(format!("stub: {} is down", ticker)));
        }
        self.quotes
            .get(ticker)
            .map(|p| *p)
            .ok_or_else(|| MarketError::UpstreamNotFound(ticker.to_string()))
    }
}

#[async_trait]
impl StockDataService for StubData {
    fn id(&self) -> &'static str {
        "stub"
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, MarketError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(quote(ticker, self.lookup(ticker)?))
    }

    async fn get_history(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<PriceHistory, MarketError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let price = self.lookup(ticker)?;
        let days = (to - from).num_days().max(0) as usize + 1;
        Ok(bars(from, days, price))
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let query = query.to_uppercase();
        let mut found: Vec<SearchResult> = self
            .quotes
            .iter()
            .filter(|e| e.key().contains(&query))
            .map(|e| SearchResult::us_stock(e.key().clone(), format!("{} Inc.", e.key())))
            .collect();
        found.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(found)
    }

    async fn get_details(&self, ticker: &str) -> Result<Quote, MarketError> {
        Ok(quote(ticker, self.lookup(ticker)?))
    }

    fn clear_cache(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

/// Analysis backend stub with call counters.
pub struct StubAi {
    pub provider: AiProvider,
    pub available: bool,
    pub fail: bool,
    /// Report this provider in results instead of `provider`.
    pub claims: Option<AiProvider>,
    pub with_levels: bool,
    pub analyze_calls: AtomicUsize,
    pub other_calls: AtomicUsize,
    pub seen: Mutex<Vec<(String, usize, AnalysisKind)>>,
}

impl StubAi {
    pub fn new(provider: AiProvider) -> Self {
        Self {
            provider,
            available: true,
            fail: false,
            claims: None,
            with_levels: false,
            analyze_calls: AtomicUsize::new(0),
            other_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn claiming(mut self, provider: AiProvider) -> Self {
        self.claims = Some(provider);
        self
    }

    pub fn with_levels(mut self) -> Self {
        self.with_levels = true;
        self
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn other_calls(&self) -> usize {
        self.other_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), MarketError> {
        if self.fail {
            Err(MarketError::UpstreamUnavailable(format!("{} stub failed", self.provider)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AiService for StubAi {
    fn provider(&self) -> AiProvider {
        self.provider
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn analyze(&self, quote: &Quote, history: &[PriceBar], kind: AnalysisKind) -> Result<AiAnalysis, MarketError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((quote.ticker.clone(), history.len(), kind));
        }
        self.check()?;

        let technical_levels = if self.with_levels {
            vec![TechnicalLevel::new(LevelKind::MinorSupport, 1.0, "stub level")]
        } else {
            Vec::new()
        };
        Ok(AiAnalysis {
            id: Uuid::new_v4(),
            ticker: quote.ticker.clone(),
            kind,
            summary: format!("{} summary", self.provider),
            sentiment: Sentiment::Neutral,
            key_points: vec![],
            patterns: vec![],
            technical_levels,
            recommendation: "Hold.".into(),
            confidence: 0.5,
            provider: self.claims.unwrap_or(self.provider),
            fetched_at: Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap(),
        })
    }

    async fn detect_patterns(&self, _history: &[PriceBar]) -> Result<Vec<Pattern>, MarketError> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(vec![])
    }

    async fn generate_insights(&self, _quote: &Quote, _indicators: &IndicatorBundle) -> Result<String, MarketError> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(format!("{} insights", self.provider))
    }

    async fn answer_question(&self, _question: &str, _quote: &Quote, _context: &str) -> Result<String, MarketError> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(format!("{} answer", self.provider))
    }
}
