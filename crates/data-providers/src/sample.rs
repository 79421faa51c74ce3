//! Network-free adapter used when sample data mode is on.
//!
//! Every value is a pure function of the ticker and the date, so two runs
//! over the same window agree exactly.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use market_core::{
    normalize_ticker, Clock, MarketError, PriceBar, PriceHistory, Quote, SearchResult,
    StockDataService,
};
use std::sync::Arc;

const PROVIDER_ID: &str = "sample";

struct SampleStock {
    ticker: &'static str,
    name: &'static str,
    price: f64,
    change: f64,
    volume: u64,
    average_volume: u64,
    market_cap: f64,
    pe_ratio: Option<f64>,
    week52_high: f64,
    week52_low: f64,
    open: f64,
}

const SAMPLES: &[SampleStock] = &[
    SampleStock {
        ticker: "AAPL",
        name: "Apple Inc.",
        price: 182.52,
        change: 2.34,
        volume: 52_430_000,
        average_volume: 58_000_000,
        market_cap: 2_850_000_000_000.0,
        pe_ratio: Some(29.5),
        week52_high: 199.62,
        week52_low: 164.08,
        open: 180.50,
    },
    SampleStock {
        ticker: "MSFT",
        name: "Microsoft Corporation",
        price: 404.87,
        change: -3.12,
        volume: 21_800_000,
        average_volume: 24_500_000,
        market_cap: 3_010_000_000_000.0,
        pe_ratio: Some(36.2),
        week52_high: 430.82,
        week52_low: 309.45,
        open: 407.10,
    },
    SampleStock {
        ticker: "NVDA",
        name: "NVIDIA Corporation",
        price: 875.28,
        change: 21.40,
        volume: 48_900_000,
        average_volume: 45_200_000,
        market_cap: 2_160_000_000_000.0,
        pe_ratio: Some(72.9),
        week52_high: 974.00,
        week52_low: 262.20,
        open: 856.00,
    },
    SampleStock {
        ticker: "TSLA",
        name: "Tesla, Inc.",
        price: 175.34,
        change: -4.86,
        volume: 96_700_000,
        average_volume: 104_000_000,
        market_cap: 558_000_000_000.0,
        pe_ratio: Some(40.8),
        week52_high: 299.29,
        week52_low: 152.37,
        open: 179.90,
    },
    SampleStock {
        ticker: "SPY",
        name: "SPDR S&P 500 ETF Trust",
        price: 509.83,
        change: 1.12,
        volume: 68_000_000,
        average_volume: 75_000_000,
        market_cap: 470_000_000_000.0,
        pe_ratio: None,
        week52_high: 523.17,
        week52_low: 404.20,
        open: 508.10,
    },
    SampleStock {
        ticker: "QQQ",
        name: "Invesco QQQ Trust",
        price: 438.27,
        change: 2.05,
        volume: 41_000_000,
        average_volume: 44_800_000,
        market_cap: 260_000_000_000.0,
        pe_ratio: None,
        week52_high: 449.34,
        week52_low: 318.40,
        open: 435.60,
    },
    SampleStock {
        ticker: "DIA",
        name: "SPDR Dow Jones Industrial Average ETF",
        price: 389.47,
        change: -0.58,
        volume: 3_100_000,
        average_volume: 3_600_000,
        market_cap: 32_000_000_000.0,
        pe_ratio: None,
        week52_high: 396.43,
        week52_low: 323.00,
        open: 390.10,
    },
];

pub struct SampleDataService {
    clock: Arc<dyn Clock>,
}

impl SampleDataService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn lookup(ticker: &str) -> Result<&'static SampleStock, MarketError> {
        SAMPLES
            .iter()
            .find(|s| s.ticker == ticker)
            .ok_or_else(|| MarketError::UpstreamNotFound(format!("{}: no sample data for {}", PROVIDER_ID, ticker)))
    }

    fn quote_for(&self, stock: &SampleStock) -> Quote {
        let previous_close = stock.price - stock.change;
        Quote {
            ticker: stock.ticker.to_string(),
            company_name: stock.name.to_string(),
            current_price: stock.price,
            daily_change: stock.change,
            daily_change_percent: stock.change / previous_close * 100.0,
            volume: stock.volume,
            average_volume: Some(stock.average_volume),
            previous_close,
            open: stock.open,
            week52_high: Some(stock.week52_high),
            week52_low: Some(stock.week52_low),
            market_cap: Some(stock.market_cap),
            pe_ratio: stock.pe_ratio,
            post_market_change: None,
            last_updated: self.clock.now(),
        }
    }
}

/// Synthetic close for a trading day.
fn sample_close(base: f64, date: NaiveDate) -> f64 {
    let d = date.num_days_from_ce() as f64;
    let raw = base * (1.0 + 0.06 * (d / 11.0).sin() + 0.03 * (d / 5.0).cos());
    (raw * 100.0).round() / 100.0
}

fn sample_bar(stock: &SampleStock, date: NaiveDate) -> PriceBar {
    let close = sample_close(stock.price, date);
    let open = sample_close(stock.price, date.pred_opt().unwrap_or(date));
    let spread = close * 0.01;
    let wobble = (date.ordinal() % 7) as u64;
    PriceBar {
        date,
        open,
        high: open.max(close) + spread,
        low: open.min(close) - spread,
        close,
        volume: stock.average_volume / 10 * (8 + wobble % 5),
    }
}

#[async_trait]
impl StockDataService for SampleDataService {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, MarketError> {
        let stock = Self::lookup(&normalize_ticker(ticker))?;
        Ok(self.quote_for(stock))
    }

    async fn get_history(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<PriceHistory, MarketError> {
        let stock = Self::lookup(&normalize_ticker(ticker))?;
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .map(|d| sample_bar(stock, d))
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }
        Ok(SAMPLES
            .iter()
            .filter(|s| s.ticker.to_lowercase().contains(&needle) || s.name.to_lowercase().contains(&needle))
            .map(|s| SearchResult::us_stock(s.ticker, s.name))
            .collect())
    }

    async fn get_details(&self, ticker: &str) -> Result<Quote, MarketError> {
        self.get_quote(ticker).await
    }

    fn clear_cache(&self) {}
}
