//! # Domain Types
//!
//! Catalog, destination and bookkeeping types shared by every crate.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │    Product      │   │ ContactDetails  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  price: Money   │   │  name, email    │       │
//! │  │  200 = 2.00%    │   │  sizes[]        │   │  → Destination  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────┐                          │
//! │  │ RateCacheEntry  │   │ ReconciliationEntry │                          │
//! │  │  from → to      │   │  stock_unreconciled │                          │
//! │  │  rate, source   │   │  notification_failed│                          │
//! │  └─────────────────┘   └─────────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::currency::CurrencyCode;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 200 bps = 2%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Product
// =============================================================================

/// Stock on hand for one size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SizeStock {
    pub size: String,
    pub stock: u32,
}

/// A catalog product as the storefront sees it.
///
/// Owned by the external catalog; the storefront only reads it and
/// decrements stock after a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,

    /// Unit price in the canonical currency.
    pub price: Money,

    pub category: Option<String>,
    pub description: Option<String>,

    /// Sizes in display order. Order is preserved end to end.
    pub sizes: Vec<SizeStock>,

    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl Product {
    /// Stock for a size, or `None` if the product does not offer it.
    pub fn stock_for(&self, size: &str) -> Option<u32> {
        self.sizes.iter().find(|s| s.size == size).map(|s| s.stock)
    }

    /// True when every size is at zero.
    pub fn is_sold_out(&self) -> bool {
        self.sizes.iter().all(|s| s.stock == 0)
    }
}

// =============================================================================
// Destination & Contact
// =============================================================================

/// Where an order ships. Drives the shipping fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Destination {
    /// ISO-3166 alpha-2 country code.
    pub country: String,
    /// Province or state code; may be empty outside the domestic country.
    pub region: String,
}

impl Destination {
    pub fn new(country: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: region.into(),
        }
    }
}

/// Buyer details captured on the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub postal: String,
}

impl ContactDetails {
    pub fn destination(&self) -> Destination {
        Destination::new(self.country.trim(), self.region.trim())
    }

    /// Single-line postal address for notifications.
    pub fn full_address(&self) -> String {
        [
            self.address.as_str(),
            self.city.as_str(),
            self.region.as_str(),
            self.country.as_str(),
            self.postal.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

// =============================================================================
// Exchange Rates
// =============================================================================

/// Where a rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RateSource {
    /// Primary upstream exchange-rate service.
    Primary,
    /// The storefront's own rates proxy.
    Fallback,
    /// A fresh entry from the local cache.
    Cached,
    /// An expired cache entry used because every upstream failed.
    Stale,
    /// Rate 1, used when nothing else is available.
    Identity,
}

impl RateSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RateSource::Primary => "primary",
            RateSource::Fallback => "fallback",
            RateSource::Cached => "cached",
            RateSource::Stale => "stale",
            RateSource::Identity => "identity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(RateSource::Primary),
            "fallback" => Some(RateSource::Fallback),
            "cached" => Some(RateSource::Cached),
            "stale" => Some(RateSource::Stale),
            "identity" => Some(RateSource::Identity),
            _ => None,
        }
    }
}

/// A cached conversion rate for one currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RateCacheEntry {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    #[ts(type = "string")]
    pub rate: Decimal,
    /// Upstream that produced the rate.
    pub source: RateSource,
    #[ts(type = "string")]
    pub fetched_at: DateTime<Utc>,
}

impl RateCacheEntry {
    /// Fresh while `now - fetched_at` is strictly less than `ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.fetched_at) < ttl
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Follow-up work left behind by a checkout that could not finish cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReconciliationKind {
    /// Payment settled but one or more stock decrements failed.
    StockUnreconciled,
    /// Order completed but the confirmation notification failed.
    NotificationFailed,
}

/// A queued follow-up for an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationEntry {
    pub id: i64,
    pub kind: ReconciliationKind,
    pub attempt_id: String,
    pub intent_id: Option<String>,
    /// JSON describing what is outstanding.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}
