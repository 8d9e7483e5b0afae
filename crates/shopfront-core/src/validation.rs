//! # Validation Module
//!
//! Synchronous checks on checkout form input and cart requests. Nothing
//! here has side effects; a failure is surfaced inline and the caller
//! stays where it was.
//!
//! ## Usage
//! ```rust
//! use shopfront_core::validation::{validate_country_code, validate_size};
//!
//! assert!(validate_size(Some("M")).is_ok());
//! assert!(validate_size(None).is_err());
//! assert!(validate_country_code("CA").is_ok());
//! ```

use crate::error::ValidationError;
use crate::shipping::ShippingRules;
use crate::types::ContactDetails;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_FIELD_LEN: usize = 200;

// =============================================================================
// Cart Input
// =============================================================================

/// A line needs a non-blank size. Returns the trimmed size.
pub fn validate_size(size: Option<&str>) -> ValidationResult<&str> {
    match size.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ValidationError::required("size")),
    }
}

/// Validates a requested quantity against the stock ceiling.
///
/// ```rust
/// use shopfront_core::validation::validate_quantity;
///
/// assert!(validate_quantity(2, 5).is_ok());
/// assert!(validate_quantity(0, 5).is_err());
/// assert!(validate_quantity(6, 5).is_err());
/// ```
pub fn validate_quantity(quantity: i64, stock: u32) -> ValidationResult<u32> {
    if quantity < 1 || quantity > i64::from(stock) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: i64::from(stock),
        });
    }
    Ok(quantity as u32)
}

// =============================================================================
// Contact Form
// =============================================================================

/// ISO-3166 alpha-2: exactly two ASCII letters.
pub fn validate_country_code(country: &str) -> ValidationResult<()> {
    let country = country.trim();
    if country.is_empty() {
        return Err(ValidationError::required("country"));
    }
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid("country", "expected a two-letter code"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::invalid("email", "must contain @")),
    }
}

/// Checks every field a shippable order needs.
///
/// The region is only required for the domestic country, where it decides
/// between free and domestic shipping.
pub fn validate_contact(contact: &ContactDetails, rules: &ShippingRules) -> ValidationResult<()> {
    for (field, value) in [
        ("name", &contact.name),
        ("phone", &contact.phone),
        ("address", &contact.address),
        ("city", &contact.city),
        ("postal", &contact.postal),
    ] {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::required(field));
        }
        if value.chars().count() > MAX_FIELD_LEN {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_FIELD_LEN,
            });
        }
    }

    validate_email(&contact.email)?;
    validate_country_code(&contact.country)?;

    if rules.is_domestic(&contact.country) && contact.region.trim().is_empty() {
        return Err(ValidationError::required("region"));
    }

    Ok(())
}
