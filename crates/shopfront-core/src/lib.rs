//! # shopfront-core: Pure Domain Logic for the Storefront
//!
//! Everything in this crate is deterministic and free of I/O. The async
//! engine in `shopfront-checkout` and the persistence layer in
//! `shopfront-db` are thin shells around these types.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    shopfront-checkout                           │   │
//! │  │   RateCache ─► PriceFormatter      CartStore ─► Orchestrator    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ shopfront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  money   │ │ currency │ │   cart   │ │ shipping │          │   │
//! │  │   │  Money   │ │ CAD, EUR │ │ CartLine │ │  rules   │          │   │
//! │  │   │ TaxRate  │ │ locales  │ │ ceilings │ │  totals  │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer money in the canonical currency
//! - [`currency`] - Closed currency table and locale number formatting
//! - [`types`] - Products, destinations, contact details, rate entries
//! - [`cart`] - Cart lines, stock ceilings, rehydration, totals
//! - [`shipping`] - Destination to shipping fee
//! - [`checkout`] - Checkout stages and attempt bookkeeping
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use shopfront_core::money::Money;
//! use shopfront_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(10_000); // C$100.00
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(200));
//! assert_eq!(tax.cents(), 200);
//! ```

pub mod cart;
pub mod checkout;
pub mod currency;
pub mod error;
pub mod money;
pub mod shipping;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartLine, OrderTotals, QuantityChange, RehydrationReport};
pub use checkout::{CheckoutAttempt, CheckoutStage, FailedStage, OrderLine, OrderSnapshot, StockKey};
pub use currency::{CurrencyCode, CurrencyConfig};
pub use error::{CartRejection, CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use shipping::ShippingRules;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Currency every price and total is stored in before display conversion.
pub const CANONICAL_CURRENCY: CurrencyCode = CurrencyCode::Cad;

/// Sales tax applied to the subtotal, in basis points (2%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 200;

/// How long a fetched exchange rate stays fresh.
pub const RATE_TTL_HOURS: i64 = 12;

/// Local cart key used when a device does not name its own.
pub const DEFAULT_CART_KEY: &str = "default";
