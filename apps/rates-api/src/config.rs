//! Rates API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::time::Duration;

use axum::http::HeaderValue;

/// Rates API configuration.
#[derive(Debug, Clone)]
pub struct RatesApiConfig {
    /// HTTP server port
    pub port: u16,

    /// ExchangeRate-API key; requests for a rate fail without one
    pub exchange_api_key: Option<String>,

    /// ExchangeRate-API v6 base URL
    pub exchange_api_base_url: String,

    /// How long a fetched pair is served from memory
    pub cache_ttl: Duration,

    /// Upstream request timeout
    pub request_timeout: Duration,

    /// The one storefront origin allowed by CORS
    pub allowed_origin: String,
}

impl Default for RatesApiConfig {
    fn default() -> Self {
        RatesApiConfig {
            port: 4242,
            exchange_api_key: None,
            exchange_api_base_url: "https://v6.exchangerate-api.com/v6".to_string(),
            cache_ttl: Duration::from_secs(43_200), // 12 hours
            request_timeout: Duration::from_secs(10),
            allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl RatesApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = RatesApiConfig::default();

        let config = RatesApiConfig {
            port: parse_or(&lookup, "PORT", defaults.port)?,

            exchange_api_key: lookup("EXCHANGE_API_KEY").filter(|key| !key.trim().is_empty()),

            exchange_api_base_url: lookup("EXCHANGE_API_BASE_URL")
                .unwrap_or(defaults.exchange_api_base_url),

            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "RATE_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),

            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),

            allowed_origin: lookup("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
        };

        config.origin_header()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn origin_header(&self) -> Result<HeaderValue, ConfigError> {
        self.allowed_origin
            .parse()
            .map_err(|_| ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string()))
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RatesApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 4242);
        assert_eq!(config.cache_ttl, Duration::from_secs(43_200));
        assert_eq!(config.allowed_origin, "http://localhost:3000");
        assert!(config.exchange_api_key.is_none());
        assert_eq!(config.bind_address(), "0.0.0.0:4242");
    }

    #[test]
    fn test_environment_values() {
        let config = RatesApiConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("EXCHANGE_API_KEY", "abc123"),
            ("RATE_CACHE_TTL_SECS", "60"),
            ("ALLOWED_ORIGIN", "https://shop.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.exchange_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.allowed_origin, "https://shop.example.com");
    }

    #[test]
    fn test_invalid_values_are_named() {
        let err = RatesApiConfig::from_lookup(lookup(&[("PORT", "not-a-port")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for PORT");

        let err = RatesApiConfig::from_lookup(lookup(&[("ALLOWED_ORIGIN", "bad\norigin")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for ALLOWED_ORIGIN");
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = RatesApiConfig::from_lookup(lookup(&[("EXCHANGE_API_KEY", "  ")])).unwrap();
        assert!(config.exchange_api_key.is_none());
    }
}
