//! # Repository Module
//!
//! One repository per table, each a thin wrapper around a cloned pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartStore ──────────► CartRepository            cart_snapshots         │
//! │  RateCache ──────────► RateCacheRepository       exchange_rates         │
//! │  DisplayCurrency ────► PreferenceRepository      preferences            │
//! │  Orchestrator ───────► CheckoutAttemptRepository checkout_attempts      │
//! │               └──────► ReconciliationRepository  reconciliation_queue   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CartRepository`](cart::CartRepository) - Cart line snapshots
//! - [`RateCacheRepository`](rate::RateCacheRepository) - One rate per currency pair
//! - [`PreferenceRepository`](preference::PreferenceRepository) - Key/value preferences
//! - [`CheckoutAttemptRepository`](attempt::CheckoutAttemptRepository) - Resumable attempts
//! - [`ReconciliationRepository`](reconciliation::ReconciliationRepository) - Operator follow-ups

pub mod attempt;
pub mod cart;
pub mod preference;
pub mod rate;
pub mod reconciliation;
