use std::collections::HashMap;
use std::env;

use crate::MarketError;

/// Opaque string lookup for credentials and flags.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment. Call [`EnvConfig::load_dotenv`] first to
/// pick up a `.env` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl EnvConfig {
    pub fn load_dotenv() -> Self {
        dotenvy::dotenv().ok();
        EnvConfig
    }
}

impl ConfigSource for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// In-memory lookup table, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MapConfig(HashMap<String, String>);

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigSource for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

pub const FINNHUB_API_KEY: &str = "FINNHUB_API_KEY";
pub const TWELVE_DATA_API_KEY: &str = "TWELVE_DATA_API_KEY";
pub const POLYGON_API_KEY: &str = "POLYGON_API_KEY";
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub finnhub_api_key: Option<String>,
    pub twelve_data_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub use_sample_data: bool,
    /// Static capability flag for the on-device analyzer.
    pub on_device_ai: bool,
    pub database_url: String,
    pub finnhub_rate_limit: usize,
    pub twelve_data_rate_limit: usize,
    pub polygon_rate_limit: usize,
    pub quote_cache_secs: i64,
    pub history_cache_secs: i64,
    pub analysis_cache_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            finnhub_api_key: None,
            twelve_data_api_key: None,
            polygon_api_key: None,
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            use_sample_data: false,
            on_device_ai: true,
            database_url: "sqlite:pulse.db".to_string(),
            finnhub_rate_limit: 60,
            twelve_data_rate_limit: 8,
            polygon_rate_limit: 5,
            quote_cache_secs: 60,
            history_cache_secs: 300,
            analysis_cache_secs: 3600,
        }
    }
}

impl EngineConfig {
    pub fn load(source: &dyn ConfigSource) -> Result<Self, MarketError> {
        let defaults = EngineConfig::default();
        Ok(Self {
            finnhub_api_key: credential(source, FINNHUB_API_KEY),
            twelve_data_api_key: credential(source, TWELVE_DATA_API_KEY),
            polygon_api_key: credential(source, POLYGON_API_KEY),
            gemini_api_key: credential(source, GEMINI_API_KEY),
            gemini_model: source.get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            use_sample_data: flag(source, "USE_SAMPLE_DATA", defaults.use_sample_data)?,
            on_device_ai: flag(source, "ON_DEVICE_AI", defaults.on_device_ai)?,
            database_url: source.get("DATABASE_URL").unwrap_or(defaults.database_url),
            finnhub_rate_limit: number(source, "FINNHUB_RATE_LIMIT", defaults.finnhub_rate_limit)?,
            twelve_data_rate_limit: number(source, "TWELVE_DATA_RATE_LIMIT", defaults.twelve_data_rate_limit)?,
            polygon_rate_limit: number(source, "POLYGON_RATE_LIMIT", defaults.polygon_rate_limit)?,
            quote_cache_secs: number(source, "QUOTE_CACHE_SECS", defaults.quote_cache_secs)?,
            history_cache_secs: number(source, "HISTORY_CACHE_SECS", defaults.history_cache_secs)?,
            analysis_cache_secs: number(source, "ANALYSIS_CACHE_SECS", defaults.analysis_cache_secs)?,
        })
    }
}

/// Empty values count as absent.
fn credential(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(source: &dyn ConfigSource, key: &str, default: bool) -> Result<bool, MarketError> {
    match source.get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(MarketError::InvalidRequest(format!("{} must be a boolean, got '{}'", key, other))),
        },
    }
}

fn number<T: std::str::FromStr>(source: &dyn ConfigSource, key: &str, default: T) -> Result<T, MarketError> {
    match source.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MarketError::InvalidRequest(format!("{} must be a number, got '{}'", key, raw))),
    }
}

/// Returns the key or a typed missing-credential failure naming it.
pub fn require_key<'a>(key: Option<&'a str>, name: &str) -> Result<&'a str, MarketError> {
    key.filter(|k| !k.is_empty())
        .ok_or_else(|| MarketError::MissingCredential(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = EngineConfig::load(&MapConfig::new()).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.quote_cache_secs, 60);
        assert!(config.on_device_ai);
    }

    #[test]
    fn test_blank_credential_is_absent() {
        let source = MapConfig::new()
            .with(FINNHUB_API_KEY, "   ")
            .with(POLYGON_API_KEY, "pk_123");
        let config = EngineConfig::load(&source).unwrap();
        assert_eq!(config.finnhub_api_key, None);
        assert_eq!(config.polygon_api_key.as_deref(), Some("pk_123"));
    }

    #[test]
    fn test_flags_and_numbers() {
        let source = MapConfig::new()
            .with("USE_SAMPLE_DATA", "true")
            .with("ON_DEVICE_AI", "0")
            .with("POLYGON_RATE_LIMIT", "500");
        let config = EngineConfig::load(&source).unwrap();
        assert!(config.use_sample_data);
        assert!(!config.on_device_ai);
        assert_eq!(config.polygon_rate_limit, 500);

        let bad = MapConfig::new().with("QUOTE_CACHE_SECS", "soon");
        assert!(EngineConfig::load(&bad).is_err());
    }

    #[test]
    fn test_require_key() {
        assert_eq!(require_key(Some("abc"), GEMINI_API_KEY).unwrap(), "abc");
        let err = require_key(None, GEMINI_API_KEY).unwrap_err();
        assert_eq!(err, MarketError::MissingCredential("GEMINI_API_KEY".into()));
    }
}
