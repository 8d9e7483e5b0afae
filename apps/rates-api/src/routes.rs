//! HTTP routes and the in-memory pair cache.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::Method,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use moka::future::Cache;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::config::ConfigError;
use crate::error::ApiError;
use crate::AppState;
use shopfront_checkout::ServiceError;
use shopfront_core::{CurrencyCode, CANONICAL_CURRENCY};

// =============================================================================
// Pair Cache
// =============================================================================

/// Fetched rates keyed by `(from, to)`.
pub type PairCache = Cache<(CurrencyCode, CurrencyCode), Decimal>;

/// Every pair is served from memory until `ttl` has passed since it was fetched.
pub fn pair_cache(ttl: Duration) -> PairCache {
    Cache::builder()
        .max_capacity(1_000)
        .time_to_live(ttl)
        .build()
}

// =============================================================================
// Router
// =============================================================================

pub fn router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let cors = CorsLayer::new()
        .allow_origin(state.config.origin_header()?)
        .allow_methods([Method::GET])
        .allow_credentials(true);

    Ok(Router::new()
        .route("/api/rates", get(rate_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RateResponse {
    pub rate: f64,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub cached: bool,
}

fn currency(raw: &str) -> Result<CurrencyCode, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::UnsupportedCurrency(raw.trim().to_string()))
}

fn number(rate: Decimal) -> Result<f64, ApiError> {
    rate.to_f64()
        .ok_or_else(|| ServiceError::invalid("rates-api", format!("rate {rate} out of range")).into())
}

/// `GET /api/rates?from=CAD&to=USD`
async fn rate_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RateQuery>,
) -> Result<Json<RateResponse>, ApiError> {
    let to = query
        .to
        .filter(|to| !to.trim().is_empty())
        .ok_or(ApiError::MissingTarget)?;
    let to = currency(&to)?;
    let from = match query.from.filter(|from| !from.trim().is_empty()) {
        Some(from) => currency(&from)?,
        None => CANONICAL_CURRENCY,
    };

    if from == to {
        return Ok(Json(RateResponse {
            rate: 1.0,
            from,
            to,
            cached: false,
        }));
    }

    if let Some(rate) = state.cache.get(&(from, to)).await {
        debug!(%from, %to, "Serving cached rate");
        return Ok(Json(RateResponse {
            rate: number(rate)?,
            from,
            to,
            cached: true,
        }));
    }

    if state.config.exchange_api_key.is_none() {
        return Err(ApiError::MissingApiKey);
    }

    let rate = state.provider.get_rate(from, to).await?;
    state.cache.insert((from, to), rate).await;
    debug!(%from, %to, %rate, "Fetched rate");

    Ok(Json(RateResponse {
        rate: number(rate)?,
        from,
        to,
        cached: false,
    }))
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
