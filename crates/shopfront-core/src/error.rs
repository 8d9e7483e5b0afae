//! # Error Types
//!
//! Domain-specific error types for shopfront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shopfront-core errors (this file)                                     │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── CartRejection    - Why a cart mutation was refused                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  shopfront-db        └── DbError                                       │
//! │  shopfront-checkout  └── CheckoutError / ServiceError                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product is not part of the current catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Currency code is not in the supported table.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Converting an amount overflowed the decimal range.
    #[error("Amount conversion overflowed for {currency}")]
    ConversionOverflow { currency: String },

    /// A checkout attempt was asked to move between incompatible stages.
    #[error("Invalid checkout transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A cart mutation was refused.
    #[error("Cart rejected change: {0}")]
    Cart(#[from] CartRejection),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Cart Rejection
// =============================================================================

/// Reasons `Cart::try_add_line` refuses a line.
///
/// The cart is never mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartRejection {
    /// No size was chosen.
    #[error("A size must be selected")]
    MissingSize,

    /// The product does not offer this size.
    #[error("Size {size} is not offered for product {product_id}")]
    UnknownSize { product_id: String, size: String },

    /// The size exists but has nothing left.
    #[error("Size {size} of product {product_id} is out of stock")]
    OutOfStock { product_id: String, size: String },

    /// The line already holds every unit in stock.
    #[error("Only {stock} of size {size} available for product {product_id}")]
    AtStockCeiling {
        product_id: String,
        size: String,
        stock: u32,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are raised synchronously and never leave side effects behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed email or country code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for a `Required` error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for an `InvalidFormat` error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_rejection_messages() {
        let err = CartRejection::AtStockCeiling {
            product_id: "tee".to_string(),
            size: "M".to_string(),
            stock: 3,
        };
        assert_eq!(err.to_string(), "Only 3 of size M available for product tee");
        assert_eq!(CartRejection::MissingSize.to_string(), "A size must be selected");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("email").to_string(), "email is required");
        assert_eq!(
            ValidationError::invalid("country", "expected two letters").to_string(),
            "country has invalid format: expected two letters"
        );
    }

    #[test]
    fn test_conversions_into_core_error() {
        let core: CoreError = CartRejection::MissingSize.into();
        assert!(matches!(core, CoreError::Cart(CartRejection::MissingSize)));

        let core: CoreError = ValidationError::required("name").into();
        assert!(matches!(core, CoreError::Validation(_)));
    }
}
