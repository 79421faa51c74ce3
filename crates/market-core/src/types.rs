use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::MarketError;

/// Point-in-time price/volume snapshot for one ticker.
///
/// Replaced wholesale on refresh; nothing patches individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub company_name: String,
    pub current_price: f64,
    pub daily_change: f64,
    pub daily_change_percent: f64,
    pub volume: u64,
    #[serde(default)]
    pub average_volume: Option<u64>,
    pub previous_close: f64,
    pub open: f64,
    #[serde(default)]
    pub week52_high: Option<f64>,
    #[serde(default)]
    pub week52_low: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub post_market_change: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl Quote {
    /// Copy of this quote whose 52-week range is taken from the closes in
    /// `history`. Returns an unchanged copy when the history is empty.
    pub fn with_range_from(&self, history: &[PriceBar]) -> Quote {
        let closes = history.iter().map(|b| b.close);
        let high = closes.clone().fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));
        let low = closes.fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))));
        Quote {
            week52_high: high.or(self.week52_high),
            week52_low: low.or(self.week52_low),
            ..self.clone()
        }
    }
}

/// OHLCV for one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Ascending by date, no duplicate dates.
pub type PriceHistory = Vec<PriceBar>;

/// Sort ascending and drop later duplicates of the same date.
pub fn normalize_history(mut bars: Vec<PriceBar>) -> PriceHistory {
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    bars
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub ticker: String,
    pub name: String,
    pub market: String,
    pub locale: String,
    #[serde(default)]
    pub primary_exchange: Option<String>,
    pub instrument_type: String,
    pub active: bool,
}

impl SearchResult {
    /// US common stock defaults used by providers that only return symbol and name.
    pub fn us_stock(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            market: "stocks".to_string(),
            locale: "us".to_string(),
            primary_exchange: None,
            instrument_type: "CS".to_string(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Indicator values for the latest point of a series.
///
/// A `None` field means the series was too short for that indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<MacdValue>,
    pub bollinger: Option<BollingerValue>,
    pub average_volume20: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelKind {
    #[serde(rename = "Major Resistance")]
    MajorResistance,
    #[serde(rename = "Near Resistance")]
    NearResistance,
    #[serde(rename = "Pivot Support")]
    PivotSupport,
    #[serde(rename = "Strong Support")]
    StrongSupport,
    #[serde(rename = "Minor Support")]
    MinorSupport,
    #[serde(rename = "Minor Resistance")]
    MinorResistance,
}

impl LevelKind {
    pub fn label(&self) -> &'static str {
        match self {
            LevelKind::MajorResistance => "Major Resistance",
            LevelKind::NearResistance => "Near Resistance",
            LevelKind::PivotSupport => "Pivot Support",
            LevelKind::StrongSupport => "Strong Support",
            LevelKind::MinorSupport => "Minor Support",
            LevelKind::MinorResistance => "Minor Resistance",
        }
    }

    pub fn is_resistance(&self) -> bool {
        matches!(
            self,
            LevelKind::MajorResistance | LevelKind::NearResistance | LevelKind::MinorResistance
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalLevel {
    pub kind: LevelKind,
    pub price: f64,
    pub rationale: String,
}

impl TechnicalLevel {
    pub fn new(kind: LevelKind, price: f64, rationale: impl Into<String>) -> Self {
        Self { kind, price, rationale: rationale.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    /// Maps free-form sentiment text onto the three values.
    ///
    /// Precedence: contains "bullish", then contains "bearish", else neutral.
    /// Phrases such as "not bullish" therefore read as bullish.
    pub fn normalize(raw: &str) -> Sentiment {
        let lowered = raw.to_lowercase();
        if lowered.contains("bullish") {
            Sentiment::Bullish
        } else if lowered.contains("bearish") {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Sentiment::normalize(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSignificance {
    High,
    Medium,
    Low,
}

impl FromStr for PatternSignificance {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(PatternSignificance::High),
            "medium" => Ok(PatternSignificance::Medium),
            "low" => Ok(PatternSignificance::Low),
            other => Err(MarketError::MalformedUpstreamResponse(format!(
                "unknown pattern significance '{}'",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for PatternSignificance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub description: String,
    pub significance: PatternSignificance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    General,
    Month,
    Week,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [AnalysisKind::General, AnalysisKind::Month, AnalysisKind::Week];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::General => "general",
            AnalysisKind::Month => "month",
            AnalysisKind::Week => "week",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::General => "General Analysis",
            AnalysisKind::Month => "1-Month Forecast",
            AnalysisKind::Week => "1-Week Forecast",
        }
    }

    /// Trailing bars considered for trend detection; `None` means all of them.
    pub fn lookback_bars(&self) -> Option<usize> {
        match self {
            AnalysisKind::General => None,
            AnalysisKind::Month => Some(21),
            AnalysisKind::Week => Some(5),
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(AnalysisKind::General),
            "month" | "1m" => Ok(AnalysisKind::Month),
            "week" | "1w" => Ok(AnalysisKind::Week),
            other => Err(MarketError::InvalidRequest(format!("unknown analysis kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AiProvider {
    OnDevice,
    Cloud,
    Mock,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::OnDevice => "on-device",
            AiProvider::Cloud => "cloud",
            AiProvider::Mock => "mock",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AiProvider::OnDevice => "On-Device AI",
            AiProvider::Cloud => "Gemini AI",
            AiProvider::Mock => "Mock Data",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on-device" | "ondevice" | "local" => Ok(AiProvider::OnDevice),
            "cloud" | "gemini" => Ok(AiProvider::Cloud),
            "mock" => Ok(AiProvider::Mock),
            other => Err(MarketError::InvalidRequest(format!("unknown AI provider '{}'", other))),
        }
    }
}

/// Result of one AI analysis run. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub id: Uuid,
    pub ticker: String,
    pub kind: AnalysisKind,
    pub summary: String,
    pub sentiment: Sentiment,
    pub key_points: Vec<String>,
    pub patterns: Vec<Pattern>,
    pub technical_levels: Vec<TechnicalLevel>,
    pub recommendation: String,
    pub confidence: f64,
    pub provider: AiProvider,
    pub fetched_at: DateTime<Utc>,
}

/// Chart windows the client can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartTimeframe {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "5D")]
    FiveDays,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "YTD")]
    YearToDate,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "ALL")]
    All,
}

impl ChartTimeframe {
    /// Number of calendar days the window spans, counted back from `today`.
    pub fn days(&self, today: NaiveDate) -> i64 {
        match self {
            ChartTimeframe::OneDay => 1,
            ChartTimeframe::FiveDays => 5,
            ChartTimeframe::OneMonth => 30,
            ChartTimeframe::ThreeMonths => 90,
            ChartTimeframe::SixMonths => 180,
            ChartTimeframe::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1)
                .map(|start| (today - start).num_days())
                .unwrap_or(365),
            ChartTimeframe::OneYear => 365,
            ChartTimeframe::All => 365 * 5,
        }
    }

    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days(today))
    }
}

impl FromStr for ChartTimeframe {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1D" => Ok(ChartTimeframe::OneDay),
            "5D" => Ok(ChartTimeframe::FiveDays),
            "1M" => Ok(ChartTimeframe::OneMonth),
            "3M" => Ok(ChartTimeframe::ThreeMonths),
            "6M" => Ok(ChartTimeframe::SixMonths),
            "YTD" => Ok(ChartTimeframe::YearToDate),
            "1Y" => Ok(ChartTimeframe::OneYear),
            "ALL" => Ok(ChartTimeframe::All),
            other => Err(MarketError::InvalidRequest(format!("unknown timeframe '{}'", other))),
        }
    }
}

/// Upper-cases and trims a user supplied ticker.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}
