//! Composition root: every service is built here and handed down explicitly.

use ai_analysis::{GeminiClient, MockAnalyzer, OnDeviceAnalyzer};
use analysis_orchestrator::{AiBackends, AiOrchestrator, MarketDataService, QuoteFanout, RecentSearches};
use data_providers::{DataRouter, FinnhubClient, PolygonClient, SampleDataService, TwelveDataClient};
use market_cache::{CacheGateway, CachePolicy, RecordStore, SqliteRecordStore, WatchlistStore};
use market_core::{Clock, EngineConfig, MarketError, SystemClock};
use std::sync::Arc;

pub struct App {
    pub market: Arc<MarketDataService>,
    pub fanout: QuoteFanout,
    pub watchlist: WatchlistStore,
    pub ai: AiOrchestrator,
}

impl App {
    pub async fn build(config: &EngineConfig) -> Result<Self, MarketError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::connect(&config.database_url).await?);
        tracing::info!("Record store ready at {}", config.database_url);

        let router = Arc::new(build_router(config, clock.clone()));
        let policy = CachePolicy::from_secs(
            config.quote_cache_secs,
            config.history_cache_secs,
            config.analysis_cache_secs,
        );
        let gateway = CacheGateway::with_policy(store.clone(), clock.clone(), policy);
        let recent = RecentSearches::new(store.clone(), clock.clone());
        let market = Arc::new(MarketDataService::new(router, gateway, recent, clock.clone()));

        let watchlist = WatchlistStore::new(store, clock.clone());
        let fanout = QuoteFanout::new(market.clone(), watchlist.clone());

        let backends = AiBackends {
            on_device: Arc::new(OnDeviceAnalyzer::new(clock.clone(), config.on_device_ai)),
            cloud: Arc::new(
                GeminiClient::new(config.gemini_api_key.clone(), clock.clone()).with_model(config.gemini_model.clone()),
            ),
            mock: Arc::new(MockAnalyzer::new(clock)),
        };
        let ai = AiOrchestrator::new(backends, config.use_sample_data, market.clone());

        Ok(Self {
            market,
            fanout,
            watchlist,
            ai,
        })
    }
}

fn build_router(config: &EngineConfig, clock: Arc<dyn Clock>) -> DataRouter {
    if config.use_sample_data {
        tracing::info!("Sample data mode: upstream providers disabled");
        return DataRouter::single(Arc::new(SampleDataService::new(clock)));
    }

    let finnhub = FinnhubClient::new(config.finnhub_api_key.clone(), clock.clone())
        .with_rate_limit(config.finnhub_rate_limit)
        .with_cache_ttl(config.quote_cache_secs);
    let twelve_data = TwelveDataClient::new(config.twelve_data_api_key.clone(), clock.clone())
        .with_rate_limit(config.twelve_data_rate_limit)
        .with_cache_ttl(config.quote_cache_secs);
    let polygon = PolygonClient::new(config.polygon_api_key.clone(), clock)
        .with_rate_limit(config.polygon_rate_limit)
        .with_cache_ttl(config.quote_cache_secs);

    for (name, key) in [
        ("Finnhub", &config.finnhub_api_key),
        ("Twelve Data", &config.twelve_data_api_key),
        ("Polygon", &config.polygon_api_key),
    ] {
        if key.is_none() {
            tracing::warn!("{} API key not configured; its calls will fail over", name);
        }
    }

    DataRouter::new(Arc::new(finnhub), Arc::new(twelve_data), Arc::new(polygon))
}
