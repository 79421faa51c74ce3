//! Picks an analysis backend, falls back from on-device to cloud once,
//! fills in locally derived levels, and caches results in two tiers.

use dashmap::DashMap;
use market_cache::CacheGateway;
use market_core::{
    normalize_ticker, AiAnalysis, AiProvider, AiService, AnalysisKind, IndicatorBundle, MarketError,
    Pattern, PriceBar, Quote,
};
use std::future::Future;
use std::sync::Arc;
use technical_analysis::{compute_bundle, derive_levels};

use crate::market_service::MarketDataService;

/// Days of history loaded for a ticker analysis.
pub const ANALYSIS_HISTORY_DAYS: i64 = 365;

pub type SharedAi = Arc<dyn AiService>;

/// The three backends, one per provider identity.
#[derive(Clone)]
pub struct AiBackends {
    pub on_device: SharedAi,
    pub cloud: SharedAi,
    pub mock: SharedAi,
}

pub struct AiOrchestrator {
    backends: AiBackends,
    use_sample_data: bool,
    market: Arc<MarketDataService>,
    gateway: CacheGateway,
    /// Process-lifetime tier, keyed like the persistent one.
    memory: DashMap<String, AiAnalysis>,
}

impl AiOrchestrator {
    pub fn new(backends: AiBackends, use_sample_data: bool, market: Arc<MarketDataService>) -> Self {
        let gateway = market.gateway().clone();
        Self {
            backends,
            use_sample_data,
            market,
            gateway,
            memory: DashMap::new(),
        }
    }

    /// Sample mode, then on-device, then cloud with credentials, then mock.
    pub fn select_provider(&self) -> AiProvider {
        if self.use_sample_data {
            AiProvider::Mock
        } else if self.backends.on_device.is_available() {
            AiProvider::OnDevice
        } else if self.backends.cloud.is_available() {
            AiProvider::Cloud
        } else {
            AiProvider::Mock
        }
    }

    fn backend(&self, provider: AiProvider) -> SharedAi {
        match provider {
            AiProvider::OnDevice => self.backends.on_device.clone(),
            AiProvider::Cloud => self.backends.cloud.clone(),
            AiProvider::Mock => self.backends.mock.clone(),
        }
    }

    /// Runs `call` on `provider`. An on-device failure is retried exactly
    /// once on the cloud backend, whose outcome is final.
    async fn with_fallback<T, F, Fut>(&self, provider: AiProvider, operation: &str, call: F) -> Result<(T, AiProvider), MarketError>
    where
        F: Fn(SharedAi) -> Fut,
        Fut: Future<Output = Result<T, MarketError>>,
    {
        match call(self.backend(provider)).await {
            Ok(value) => Ok((value, provider)),
            Err(e) if provider == AiProvider::OnDevice => {
                tracing::warn!("On-device {} failed, retrying with {}: {}", operation, AiProvider::Cloud.display_name(), e);
                let value = call(self.backend(AiProvider::Cloud)).await?;
                Ok((value, AiProvider::Cloud))
            }
            Err(e) => {
                tracing::warn!("{} {} failed: {}", provider.display_name(), operation, e);
                Err(e)
            }
        }
    }

    async fn cached(&self, key: &str, ticker: &str, provider: AiProvider, kind: AnalysisKind) -> Option<AiAnalysis> {
        if let Some(hit) = self.memory.get(key) {
            tracing::debug!("Analysis memory hit {}", key);
            return Some(hit.value().clone());
        }
        let stored = self.gateway.analysis(ticker, provider, kind).await?;
        self.memory.insert(key.to_string(), stored.clone());
        Some(stored)
    }

    /// Analysis for `quote`, from cache when possible.
    ///
    /// Cached under the selected (or forced) provider; the result's
    /// `provider` names the backend that actually produced it.
    pub async fn analyze(
        &self,
        quote: &Quote,
        history: &[PriceBar],
        kind: AnalysisKind,
        force: Option<AiProvider>,
    ) -> Result<AiAnalysis, MarketError> {
        let provider = force.unwrap_or_else(|| self.select_provider());
        let ticker = normalize_ticker(&quote.ticker);
        let key = CacheGateway::analysis_key(&ticker, provider, kind);

        if let Some(hit) = self.cached(&key, &ticker, provider, kind).await {
            return Ok(hit);
        }
        self.compute(&key, provider, quote, history, kind).await
    }

    /// Loads the quote and a year of history first, then analyzes.
    pub async fn analyze_ticker(
        &self,
        ticker: &str,
        kind: AnalysisKind,
        force: Option<AiProvider>,
    ) -> Result<AiAnalysis, MarketError> {
        let ticker = normalize_ticker(ticker);
        let provider = force.unwrap_or_else(|| self.select_provider());
        let key = CacheGateway::analysis_key(&ticker, provider, kind);
        if let Some(hit) = self.cached(&key, &ticker, provider, kind).await {
            return Ok(hit);
        }

        let quote = self.market.quote(&ticker).await?;
        let history = match self.market.recent_history(&ticker, ANALYSIS_HISTORY_DAYS).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("No history for {}, analyzing quote only: {}", ticker, e);
                Vec::new()
            }
        };
        self.compute(&key, provider, &quote, &history, kind).await
    }

    async fn compute(
        &self,
        key: &str,
        provider: AiProvider,
        quote: &Quote,
        history: &[PriceBar],
        kind: AnalysisKind,
    ) -> Result<AiAnalysis, MarketError> {
        tracing::info!("Running {} analysis for {} with {}", kind, quote.ticker, provider.display_name());
        let (raw, produced_by) = self
            .with_fallback(provider, "analysis", move |ai| async move { ai.analyze(quote, history, kind).await })
            .await?;

        let analysis = finalize(raw, produced_by, quote, history);
        self.memory.insert(key.to_string(), analysis.clone());
        self.gateway
            .put_analysis(&normalize_ticker(&quote.ticker), provider, kind, &analysis)
            .await;
        Ok(analysis)
    }

    pub async fn detect_patterns(&self, history: &[PriceBar], force: Option<AiProvider>) -> Result<Vec<Pattern>, MarketError> {
        let provider = force.unwrap_or_else(|| self.select_provider());
        let (patterns, _) = self
            .with_fallback(provider, "pattern detection", move |ai| async move { ai.detect_patterns(history).await })
            .await?;
        Ok(patterns)
    }

    pub async fn generate_insights(
        &self,
        quote: &Quote,
        indicators: &IndicatorBundle,
        force: Option<AiProvider>,
    ) -> Result<String, MarketError> {
        let provider = force.unwrap_or_else(|| self.select_provider());
        let (text, _) = self
            .with_fallback(provider, "insights", move |ai| async move {
                ai.generate_insights(quote, indicators).await
            })
            .await?;
        Ok(text)
    }

    pub async fn answer_question(
        &self,
        question: &str,
        quote: &Quote,
        context: &str,
        force: Option<AiProvider>,
    ) -> Result<String, MarketError> {
        let provider = force.unwrap_or_else(|| self.select_provider());
        let (text, _) = self
            .with_fallback(provider, "question", move |ai| async move {
                ai.answer_question(question, quote, context).await
            })
            .await?;
        Ok(text)
    }

    /// Drops the whole memory tier. Persistent entries age out on their own.
    pub fn refresh(&self) {
        let dropped = self.memory.len();
        self.memory.clear();
        tracing::info!("Cleared {} in-memory analyses", dropped);
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }
}

/// Stamps the producing backend and derives levels when none were supplied.
fn finalize(raw: AiAnalysis, produced_by: AiProvider, quote: &Quote, history: &[PriceBar]) -> AiAnalysis {
    if raw.provider != produced_by {
        tracing::debug!("Backend reported {} but {} produced the analysis", raw.provider, produced_by);
    }

    let technical_levels = if raw.technical_levels.is_empty() {
        let widened = quote.with_range_from(history);
        derive_levels(
            widened.current_price,
            widened.week52_high,
            widened.week52_low,
            &compute_bundle(history),
        )
    } else {
        raw.technical_levels.clone()
    };

    AiAnalysis {
        provider: produced_by,
        technical_levels,
        ..raw
    }
}
