pub mod ai_orchestrator;
pub mod fanout;
pub mod market_service;
pub mod recent;

#[cfg(test)]
mod test_support;

pub use ai_orchestrator::{AiBackends, AiOrchestrator};
pub use fanout::{QuoteFanout, WatchlistSnapshot, DEFAULT_WATCHLIST, MARKET_INDICES};
pub use market_service::MarketDataService;
pub use recent::{RecentSearches, MAX_RECENT_SEARCHES};
