pub mod cache;
pub mod finnhub;
pub mod http;
pub mod polygon;
pub mod router;
pub mod sample;
pub mod twelve_data;

pub use cache::AdapterCache;
pub use finnhub::FinnhubClient;
pub use http::{HttpClient, RateLimiter};
pub use polygon::PolygonClient;
pub use router::{DataRouter, RouterChains};
pub use sample::SampleDataService;
pub use twelve_data::TwelveDataClient;
