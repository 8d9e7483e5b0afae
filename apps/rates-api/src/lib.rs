//! # Shopfront Rates API
//!
//! Fallback exchange-rate service for the storefront.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Rates API                                     │
//! │                                                                         │
//! │  Storefront ──► GET /api/rates?from=CAD&to=USD                          │
//! │                        │                                                │
//! │                        ├─ from == to ─────────────► { rate: 1 }         │
//! │                        ├─ moka pair cache hit ────► { cached: true }    │
//! │                        └─ ExchangeRate-API v6 ────► { cached: false }   │
//! │                                                                         │
//! │  GET /health ──► "OK"                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `PORT` - HTTP port (default: 4242)
//! - `EXCHANGE_API_KEY` - ExchangeRate-API key
//! - `EXCHANGE_API_BASE_URL` - upstream base URL
//! - `RATE_CACHE_TTL_SECS` - pair cache lifetime (default: 43200)
//! - `REQUEST_TIMEOUT_SECS` - upstream timeout (default: 10)
//! - `ALLOWED_ORIGIN` - CORS origin (default: http://localhost:3000)

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use shopfront_checkout::{ExchangeRateApiClient, RateProvider};

// Re-exports
pub use config::{ConfigError, RatesApiConfig};
pub use error::ApiError;
pub use routes::{pair_cache, router, PairCache, RateResponse};

/// Shared application state.
pub struct AppState {
    pub config: RatesApiConfig,
    pub provider: Arc<dyn RateProvider>,
    pub cache: PairCache,
}

impl AppState {
    pub fn new(config: RatesApiConfig) -> Self {
        let provider = Arc::new(ExchangeRateApiClient::new(
            config.exchange_api_base_url.clone(),
            config.exchange_api_key.clone(),
            config.request_timeout,
        ));
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: RatesApiConfig, provider: Arc<dyn RateProvider>) -> Self {
        AppState {
            cache: pair_cache(config.cache_ttl),
            config,
            provider,
        }
    }
}
