//! Error types for the Rates API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use shopfront_checkout::ServiceError;

/// Rates API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Target currency (to) is required")]
    MissingTarget,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Exchange API key not configured")]
    MissingApiKey,

    #[error("Failed to fetch exchange rate")]
    Upstream(#[from] ServiceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingTarget | ApiError::UnsupportedCurrency(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::Upstream(cause) => {
                tracing::error!(error = %cause, "Exchange rate fetch error");
                json!({ "error": self.to_string(), "details": cause.to_string() })
            }
            ApiError::MissingApiKey => {
                tracing::error!("EXCHANGE_API_KEY is not set");
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (self.status(), Json(body)).into_response()
    }
}
