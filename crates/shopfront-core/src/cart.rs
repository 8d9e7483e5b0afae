//! # Cart
//!
//! Ordered cart lines with per-size stock ceilings, and the totals derived
//! from them.
//!
//! ## Line Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   key = (product_id, size)          1 <= quantity <= stock(key)         │
//! │                                                                         │
//! │   try_add_line ──► existing key?  ── yes ──► quantity + 1 (≤ ceiling)   │
//! │                         │                                               │
//! │                         no ──► append with quantity 1                   │
//! │                                                                         │
//! │   update_quantity(n) ──► n < 1: ignored                                 │
//! │                          n > stock: clamped to stock                    │
//! │                          stock == 0: line removed (no valid quantity)   │
//! │                                                                         │
//! │   rehydrate ──► unknown/zero stock: dropped                             │
//! │                 quantity > stock:   clamped down, never up              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CartRejection;
use crate::money::Money;
use crate::shipping::ShippingRules;
use crate::types::{Destination, Product, TaxRate};

// =============================================================================
// Cart Line
// =============================================================================

/// One (product, size) pairing in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,

    /// Product as it looked when the line was added or last refreshed.
    pub product: Product,

    pub size: String,
    pub quantity: u32,

    /// Stock for this size captured at the last mutation.
    pub size_stock: u32,
}

impl CartLine {
    pub fn unit_price(&self) -> Money {
        self.product.price
    }

    pub fn line_total(&self) -> Money {
        self.product.price * self.quantity
    }

    pub fn matches(&self, product_id: &str, size: &str) -> bool {
        self.product_id == product_id && self.size == size
    }
}

/// What `Cart::update_quantity` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// No matching line, or the request was below 1.
    Ignored,
    /// Quantity set; `clamped` is true when the request exceeded stock.
    Set { quantity: u32, clamped: bool },
    /// Stock hit zero, so the line could not stay in the cart.
    Removed,
}

/// Lines altered while rehydrating a persisted cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehydrationReport {
    /// `(product_id, size)` of lines that were discarded.
    pub dropped: Vec<(String, String)>,
    /// `(product_id, size, from, to)` of lines whose quantity was lowered.
    pub clamped: Vec<(String, String, u32, u32)>,
}

impl RehydrationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.clamped.is_empty()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// An ordered list of cart lines, unique by `(product_id, size)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of quantities across lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn line(&self, product_id: &str, size: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(product_id, size))
    }

    /// Adds one unit of `product` in `size`, using the stock on `product`.
    ///
    /// Returns the line's new quantity. The cart is untouched on rejection.
    pub fn try_add_line(
        &mut self,
        product: &Product,
        size: Option<&str>,
    ) -> Result<u32, CartRejection> {
        let size = match size.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Err(CartRejection::MissingSize),
        };

        let stock = product
            .stock_for(size)
            .ok_or_else(|| CartRejection::UnknownSize {
                product_id: product.id.clone(),
                size: size.to_string(),
            })?;

        if stock == 0 {
            return Err(CartRejection::OutOfStock {
                product_id: product.id.clone(),
                size: size.to_string(),
            });
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.matches(&product.id, size)) {
            if line.quantity >= stock {
                return Err(CartRejection::AtStockCeiling {
                    product_id: product.id.clone(),
                    size: size.to_string(),
                    stock,
                });
            }
            line.quantity += 1;
            line.size_stock = stock;
            line.product = product.clone();
            return Ok(line.quantity);
        }

        self.lines.push(CartLine {
            product_id: product.id.clone(),
            product: product.clone(),
            size: size.to_string(),
            quantity: 1,
            size_stock: stock,
        });
        Ok(1)
    }

    /// Boolean form of [`Cart::try_add_line`].
    pub fn add_line(&mut self, product: &Product, size: Option<&str>) -> bool {
        self.try_add_line(product, size).is_ok()
    }

    /// Sets a line's quantity, clamped to `[1, current_stock]`.
    ///
    /// Requests below 1 are ignored; removal is [`Cart::remove_line`].
    pub fn update_quantity(
        &mut self,
        product_id: &str,
        size: &str,
        new_quantity: i64,
        current_stock: u32,
    ) -> QuantityChange {
        let Some(index) = self.lines.iter().position(|l| l.matches(product_id, size)) else {
            return QuantityChange::Ignored;
        };
        if new_quantity < 1 {
            return QuantityChange::Ignored;
        }
        if current_stock == 0 {
            self.lines.remove(index);
            return QuantityChange::Removed;
        }

        let requested = u32::try_from(new_quantity).unwrap_or(u32::MAX);
        let quantity = requested.min(current_stock);
        let line = &mut self.lines[index];
        line.quantity = quantity;
        line.size_stock = current_stock;

        QuantityChange::Set {
            quantity,
            clamped: requested > current_stock,
        }
    }

    /// Removes the matching line. Returns false if there was none.
    pub fn remove_line(&mut self, product_id: &str, size: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(product_id, size));
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Rebuilds a cart from persisted lines, re-validating each against
    /// `stock_lookup(product_id, size)`.
    ///
    /// Lines with unknown or zero stock, an empty size or zero quantity are
    /// dropped. Quantities above stock are lowered to it. Duplicate keys are
    /// merged before clamping. Line order is preserved.
    pub fn rehydrate<F>(persisted: Vec<CartLine>, stock_lookup: F) -> (Cart, RehydrationReport)
    where
        F: Fn(&str, &str) -> Option<u32>,
    {
        let mut merged: Vec<CartLine> = Vec::with_capacity(persisted.len());
        for line in persisted {
            match merged
                .iter_mut()
                .find(|m| m.matches(&line.product_id, &line.size))
            {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity)
                }
                None => merged.push(line),
            }
        }

        let mut report = RehydrationReport::default();
        let mut lines = Vec::with_capacity(merged.len());

        for mut line in merged {
            let key = (line.product_id.clone(), line.size.clone());
            let stock = if line.size.trim().is_empty() {
                None
            } else {
                stock_lookup(&line.product_id, &line.size)
            };

            match stock {
                Some(stock) if stock > 0 && line.quantity > 0 => {
                    if line.quantity > stock {
                        report.clamped.push((key.0, key.1, line.quantity, stock));
                        line.quantity = stock;
                    }
                    line.size_stock = stock;
                    lines.push(line);
                }
                _ => report.dropped.push(key),
            }
        }

        (Cart { lines }, report)
    }
}

// =============================================================================
// Order Totals
// =============================================================================

/// Totals in the canonical currency. Derived, never persisted on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Computes totals for a cart.
    ///
    /// Shipping is zero for an empty cart or when no destination is known yet.
    ///
    /// ```rust
    /// use shopfront_core::cart::{Cart, OrderTotals};
    /// use shopfront_core::shipping::ShippingRules;
    /// use shopfront_core::types::TaxRate;
    ///
    /// let totals = OrderTotals::compute(&Cart::new(), TaxRate::default(), &ShippingRules::default(), None);
    /// assert!(totals.total.is_zero());
    /// ```
    pub fn compute(
        cart: &Cart,
        tax_rate: TaxRate,
        rules: &ShippingRules,
        destination: Option<&Destination>,
    ) -> Self {
        let subtotal = cart.subtotal();
        let tax = subtotal.calculate_tax(tax_rate);
        let shipping = match destination {
            Some(dest) if !cart.is_empty() => rules.cost_for(dest),
            _ => Money::zero(),
        };

        Self {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }
}

impl From<&Cart> for OrderTotals {
    /// Totals at the default tax rate with no destination.
    fn from(cart: &Cart) -> Self {
        OrderTotals::compute(cart, TaxRate::default(), &ShippingRules::default(), None)
    }
}
