//! # Checkout State
//!
//! Stages of one checkout attempt and the bookkeeping that makes a retry
//! safe: the settled intent is reused and stock keys already decremented
//! are never decremented again.
//!
//! ## State Machine
//! ```text
//!   Idle ──► IntentPending ──► PaymentConfirming ──► StockUpdating ──► Notifying ──► Complete
//!    ▲            │                  │    │                │               │
//!    │            │                  │    │ declined       │               │
//!    └────────────┼──────────────────┘◄───┘                │               │
//!                 ▼                  ▼                     ▼               ▼
//!              Failed(stage) ◄───────────────────────────────────────────────
//!                 │
//!                 ├── retry, not settled ──► IntentPending
//!                 └── retry, settled     ──► StockUpdating / Notifying
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::{Cart, OrderTotals};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::ContactDetails;

// =============================================================================
// Stages
// =============================================================================

/// The active stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FailedStage {
    IntentPending,
    PaymentConfirming,
    StockUpdating,
    Notifying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "stage", content = "at", rename_all = "snake_case")]
#[ts(export)]
pub enum CheckoutStage {
    Idle,
    IntentPending,
    PaymentConfirming,
    StockUpdating,
    Notifying,
    Complete,
    Failed(FailedStage),
}

impl CheckoutStage {
    pub fn can_transition_to(&self, next: CheckoutStage) -> bool {
        use CheckoutStage::*;

        match (self, next) {
            (Idle, IntentPending) => true,
            (IntentPending, PaymentConfirming) => true,
            // Declined or timed out: back to the form, nothing to undo
            (PaymentConfirming, Idle) => true,
            (PaymentConfirming, StockUpdating) => true,
            (StockUpdating, Notifying) => true,
            (Notifying, Complete) => true,
            (Failed(_), IntentPending | StockUpdating | Notifying) => true,
            (Idle | Complete | Failed(_), Failed(_)) => false,
            (_, Failed(_)) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutStage::Complete)
    }

    /// Reverse of `Failed(at)` for the stage the failure happened in.
    pub fn failed_at(&self) -> Option<FailedStage> {
        match self {
            CheckoutStage::IntentPending => Some(FailedStage::IntentPending),
            CheckoutStage::PaymentConfirming => Some(FailedStage::PaymentConfirming),
            CheckoutStage::StockUpdating => Some(FailedStage::StockUpdating),
            CheckoutStage::Notifying => Some(FailedStage::Notifying),
            _ => None,
        }
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutStage::Idle => f.write_str("idle"),
            CheckoutStage::IntentPending => f.write_str("intent_pending"),
            CheckoutStage::PaymentConfirming => f.write_str("payment_confirming"),
            CheckoutStage::StockUpdating => f.write_str("stock_updating"),
            CheckoutStage::Notifying => f.write_str("notifying"),
            CheckoutStage::Complete => f.write_str("complete"),
            CheckoutStage::Failed(at) => write!(f, "failed({at:?})"),
        }
    }
}

// =============================================================================
// Order Snapshot
// =============================================================================

/// Inventory key a decrement applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockKey {
    pub product_id: String,
    pub size: String,
}

impl StockKey {
    pub fn new(product_id: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.into(),
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_id, self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    pub size: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// The order as it stood when payment was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderSnapshot {
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub contact: ContactDetails,
}

impl OrderSnapshot {
    pub fn from_cart(cart: &Cart, totals: OrderTotals, contact: ContactDetails) -> Self {
        let lines = cart
            .lines()
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id.clone(),
                name: line.product.name.clone(),
                size: line.size.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price(),
            })
            .collect();

        Self {
            lines,
            totals,
            contact,
        }
    }

    /// `"2x Logo Tee (Size: M), 1x Cap (Size: OS)"`
    pub fn summary(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{}x {} (Size: {})", l.quantity, l.name, l.size))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Quantities per stock key, with duplicate lines coalesced.
    pub fn stock_quantities(&self) -> BTreeMap<StockKey, u32> {
        aggregate_stock(&self.lines)
    }
}

pub fn aggregate_stock(lines: &[OrderLine]) -> BTreeMap<StockKey, u32> {
    let mut totals = BTreeMap::new();
    for line in lines {
        *totals
            .entry(StockKey::new(&line.product_id, &line.size))
            .or_insert(0u32) += line.quantity;
    }
    totals
}

// =============================================================================
// Checkout Attempt
// =============================================================================

/// Everything needed to resume a checkout without charging twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutAttempt {
    pub attempt_id: String,
    pub intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub stage: CheckoutStage,

    /// Set once the gateway reports the payment as captured.
    pub settled: bool,

    pub order: Option<OrderSnapshot>,

    /// Keys whose decrement already succeeded for this intent.
    pub decremented: BTreeSet<StockKey>,

    pub notified: bool,
    pub cart_cleared: bool,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl CheckoutAttempt {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            attempt_id: Uuid::new_v4().to_string(),
            intent_id: None,
            client_secret: None,
            stage: CheckoutStage::Idle,
            settled: false,
            order: None,
            decremented: BTreeSet::new(),
            notified: false,
            cart_cleared: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next`, refusing transitions the state machine forbids.
    pub fn transition(&mut self, next: CheckoutStage, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.stage.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }
        self.stage = next;
        self.updated_at = now;
        Ok(())
    }

    /// Records a failure in the current stage.
    pub fn fail(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        match self.stage.failed_at() {
            Some(at) => self.transition(CheckoutStage::Failed(at), now),
            None => Err(CoreError::InvalidTransition {
                from: self.stage.to_string(),
                to: "failed".to_string(),
            }),
        }
    }

    /// Stock keys still to decrement, with their quantities.
    pub fn pending_stock(&self) -> BTreeMap<StockKey, u32> {
        self.order
            .as_ref()
            .map(OrderSnapshot::stock_quantities)
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| !self.decremented.contains(key))
            .collect()
    }

    pub fn stock_reconciled(&self) -> bool {
        self.settled && self.pending_stock().is_empty()
    }

    /// Open attempts are kept and resumed; complete ones are history.
    pub fn is_open(&self) -> bool {
        !self.stage.is_terminal()
    }
}
