//! # Collaborator Contracts
//!
//! Everything the checkout engine talks to over the network sits behind
//! one of these traits, so the stores and the orchestrator can be driven
//! by real HTTP clients in production and by scripted doubles in tests.
//!
//! ```text
//! ┌────────────────────┐   list_products / decrement_stock
//! │  CatalogBackend    │◄──────────────────────────────────── CartStore, Orchestrator
//! ├────────────────────┤
//! │  PaymentGateway    │◄──── create/update intent, confirm ── Orchestrator
//! ├────────────────────┤
//! │  RateProvider      │◄──── get_rate(from, to) ───────────── RateCache
//! ├────────────────────┤
//! │  NotificationService│◄─── send(template, fields) ───────── Orchestrator
//! └────────────────────┘
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use shopfront_core::{CurrencyCode, Money, Product};

// =============================================================================
// Catalog / Inventory
// =============================================================================

#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Current products with per-size stock.
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError>;

    /// Removes `quantity` units from a size, stopping at zero.
    async fn decrement_stock(
        &self,
        product_id: &str,
        size: &str,
        quantity: u32,
    ) -> Result<(), ServiceError>;
}

// =============================================================================
// Payments
// =============================================================================

/// What the gateway is asked to charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub amount: Money,
    pub currency: CurrencyCode,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    Declined,
}

impl PaymentStatus {
    /// Only a succeeded payment counts as captured.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub status: PaymentStatus,
    /// Gateway text for anything other than success.
    pub message: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ServiceError>;

    /// Refreshes amount and metadata on an existing intent.
    async fn update_intent(
        &self,
        intent_id: &str,
        request: &IntentRequest,
    ) -> Result<PaymentIntent, ServiceError>;

    async fn confirm_payment(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<PaymentConfirmation, ServiceError>;

    /// Current status of an intent, as the gateway sees it.
    async fn payment_status(&self, intent_id: &str) -> Result<PaymentStatus, ServiceError>;
}

// =============================================================================
// Exchange Rates
// =============================================================================

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Units of `to` per one unit of `from`.
    async fn get_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<Decimal, ServiceError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub fields: BTreeMap<String, String>,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), ServiceError>;
}

// =============================================================================
// Time
// =============================================================================

/// Source of "now" for TTLs and attempt timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_succeeded_is_settled() {
        assert!(PaymentStatus::Succeeded.is_settled());
        assert!(!PaymentStatus::Processing.is_settled());
        assert!(!PaymentStatus::RequiresAction.is_settled());
        assert!(!PaymentStatus::Declined.is_settled());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&PaymentStatus::RequiresAction).unwrap();
        assert_eq!(json, "\"requires_action\"");
    }
}
