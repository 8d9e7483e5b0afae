//! # Checkout Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Validation     │  │  Payment        │  │  Configuration          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  PaymentFailed  │  │  InvalidConfig          │ │
//! │  │  CartRejected   │  │  (gateway text) │  │  InvalidUrl             │ │
//! │  │  EmptyCart      │  │  IntentFailed   │  │  ConfigLoad/SaveFailed  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Collaborators  │  │  Internal       │                              │
//! │  │                 │  │                 │                              │
//! │  │  Service(..)    │  │  Database       │                              │
//! │  │  Catalog        │  │  Core           │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Post-payment problems (stock, notification) are not errors here: the
//! orchestrator reports them in its `CheckoutReport` and the
//! reconciliation queue, because the user-facing outcome is still success.

use thiserror::Error;

use shopfront_core::{CartRejection, CoreError, ValidationError};

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Failure of an external collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached.
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    /// No answer within the configured timeout.
    #[error("{service} timed out after {seconds}s")]
    Timeout { service: String, seconds: u64 },

    /// The service answered and said no. `message` is shown to the user as is.
    #[error("{message}")]
    Rejected { service: String, message: String },

    /// The service answered with something we could not use.
    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse { service: String, message: String },
}

impl ServiceError {
    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn rejected(service: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn invalid(service: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::InvalidResponse {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Text safe to show a shopper.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Rejected { message, .. } => message.clone(),
            ServiceError::Timeout { .. } => {
                "The payment service did not respond in time. Please try again.".to_string()
            }
            _ => "The payment service is unavailable. Please try again.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Unavailable { .. } | ServiceError::Timeout { .. }
        )
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let service = err
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("http")
            .to_string();
        if err.is_timeout() {
            ServiceError::Timeout {
                service,
                seconds: 0,
            }
        } else if err.is_decode() {
            ServiceError::InvalidResponse {
                service,
                message: err.to_string(),
            }
        } else {
            ServiceError::Unavailable {
                service,
                message: err.to_string(),
            }
        }
    }
}

/// Checkout engine error type.
#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Validation
    // =========================================================================
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    CartRejected(#[from] CartRejection),

    #[error("The cart is empty")]
    EmptyCart,

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    // =========================================================================
    // Payment
    // =========================================================================
    /// Confirmation was declined or failed. The message comes from the gateway.
    #[error("Payment failed: {message}")]
    PaymentFailed { message: String },

    /// No payment intent could be created or updated.
    #[error("Could not start payment: {0}")]
    IntentFailed(ServiceError),

    /// Another checkout step is already running for this store.
    #[error("A checkout is already in progress")]
    CheckoutInProgress,

    /// A retry named an attempt that does not exist or is already complete.
    #[error("No open checkout attempt {0}")]
    UnknownAttempt(String),

    // =========================================================================
    // Collaborators
    // =========================================================================
    #[error("Catalog error: {0}")]
    Catalog(ServiceError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] shopfront_db::DbError),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A settled attempt was loaded without its order snapshot.
    #[error("Checkout attempt {0} has no order")]
    MissingOrder(String),

    #[error(transparent)]
    Core(CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for CheckoutError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => CheckoutError::Validation(v),
            CoreError::Cart(c) => CheckoutError::CartRejected(c),
            CoreError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
            other => CheckoutError::Core(other),
        }
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for CheckoutError {
    fn from(err: url::ParseError) -> Self {
        CheckoutError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for CheckoutError {
    fn from(err: std::io::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for CheckoutError {
    fn from(err: toml::de::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for CheckoutError {
    fn from(err: toml::ser::Error) -> Self {
        CheckoutError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl CheckoutError {
    /// Rejected synchronously with no side effects; show inline.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CheckoutError::Validation(_)
                | CheckoutError::CartRejected(_)
                | CheckoutError::EmptyCart
                | CheckoutError::ProductNotFound(_)
        )
    }

    /// Declined or failed payment; the cart is untouched.
    pub fn is_payment_failure(&self) -> bool {
        matches!(
            self,
            CheckoutError::PaymentFailed { .. } | CheckoutError::IntentFailed(_)
        )
    }

    /// Safe to try the same operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::IntentFailed(e) | CheckoutError::Catalog(e) | CheckoutError::Service(e) => {
                e.is_retryable()
            }
            CheckoutError::PaymentFailed { .. } | CheckoutError::CheckoutInProgress => true,
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::InvalidConfig(_)
                | CheckoutError::InvalidUrl(_)
                | CheckoutError::ConfigLoadFailed(_)
                | CheckoutError::ConfigSaveFailed(_)
        )
    }
}
