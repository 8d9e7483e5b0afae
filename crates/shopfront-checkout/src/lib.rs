//! # shopfront-checkout: Stores and Checkout for Shopfront
//!
//! This crate holds the stateful half of the storefront: the persisted cart,
//! the display currency, the exchange-rate cache and the checkout pipeline.
//! Pure domain rules live in `shopfront-core`; persistence in `shopfront-db`.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Storefront (wiring)                            │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   CartStore    │  │  DisplayCur-   │  │      RateCache         │    │
//! │  │                │  │  rencyStore    │  │                        │    │
//! │  │ Lines + dest.  │  │ watch channel  │  │ cache → primary →      │    │
//! │  │ persisted per  │  │ persisted pref │  │ fallback → stale →     │    │
//! │  │ mutation       │  │                │  │ identity               │    │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │          │                   └──────────┬────────────┘                  │
//! │          │                              ▼                               │
//! │          │                     ┌────────────────┐                       │
//! │          │                     │ PriceFormatter │                       │
//! │          │                     └────────────────┘                       │
//! │          ▼                                                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   CheckoutOrchestrator                          │   │
//! │  │                                                                 │   │
//! │  │ Idle → IntentPending → PaymentConfirming → StockUpdating →      │   │
//! │  │ Notifying → Complete, checkpointed to checkout_attempts         │   │
//! │  │ Partial failures land in reconciliation_queue                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  COLLABORATORS (traits in [`services`]):                               │
//! │  • CatalogBackend      - product listing, stock decrements             │
//! │  • PaymentGateway      - intents and confirmation                      │
//! │  • RateProvider        - ExchangeRate-API, rates-api proxy             │
//! │  • NotificationService - EmailJS order confirmations                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopfront_checkout::{CheckoutRequest, ShopfrontConfig, Storefront};
//!
//! let config = ShopfrontConfig::load_or_default(None);
//! let (shop, report) = Storefront::open(config, catalog, gateway).await?;
//!
//! shop.cart.add_line(&product, Some("M")).await;
//! let receipt = shop.checkout.checkout(&request).await?;
//! println!("Order {} at {:?}", receipt.attempt_id, receipt.stage);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod services;

// Stores
pub mod cart_store;
pub mod currency_store;
pub mod rates;

// Presentation and checkout
pub mod formatter;
pub mod orchestrator;

// HTTP collaborators and wiring
pub mod http;
pub mod storefront;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart_store::{CartStore, CartView};
pub use config::{NotificationSettings, RateSettings, ShopfrontConfig};
pub use currency_store::DisplayCurrencyStore;
pub use error::{CheckoutError, CheckoutResult, ServiceError};
pub use formatter::{FormatOptions, PriceFormatter};
pub use http::{EmailJsNotifier, ExchangeRateApiClient, RatesProxyClient};
pub use orchestrator::{CheckoutOrchestrator, CheckoutReport, CheckoutRequest};
pub use rates::{RateCache, RateQuote};
pub use services::{
    CatalogBackend, Clock, IntentRequest, Notification, NotificationService, PaymentConfirmation,
    PaymentGateway, PaymentIntent, PaymentStatus, RateProvider, SystemClock,
};
pub use storefront::Storefront;
