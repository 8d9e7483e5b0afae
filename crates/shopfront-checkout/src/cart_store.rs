//! # Cart Store
//!
//! The shopper's cart, kept in memory, persisted after every mutation and
//! published to subscribers as a [`CartView`] with derived totals.
//!
//! ## Mutation Flow
//! ```text
//! add_line / update_quantity / remove_line / clear / set_destination
//!   │
//!   ▼
//! lock state ──► shopfront_core::Cart rule ──► save snapshot ──► publish view
//!                (stock ceiling, clamping)     (SQLite, JSON)     (watch channel)
//! ```
//!
//! Mutations are serialized on one async mutex. A failed save is logged and
//! the in-memory cart stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::CheckoutResult;
use crate::services::CatalogBackend;
use shopfront_core::{
    Cart, CartLine, Destination, OrderTotals, Product, QuantityChange, RehydrationReport,
    ShippingRules, TaxRate,
};
use shopfront_db::CartRepository;

/// Read-only projection handed to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub destination: Option<Destination>,
    pub totals: OrderTotals,
}

struct CartState {
    cart: Cart,
    destination: Option<Destination>,
    /// Latest catalog listing by product id.
    products: HashMap<String, Product>,
}

impl CartState {
    /// Catalog stock when the product is known, else the stock cached on the line.
    fn current_stock(&self, product_id: &str, size: &str) -> u32 {
        match self.products.get(product_id) {
            Some(product) => product.stock_for(size).unwrap_or(0),
            None => self
                .cart
                .line(product_id, size)
                .map(|line| line.size_stock)
                .unwrap_or(0),
        }
    }
}

pub struct CartStore {
    state: Mutex<CartState>,
    repo: CartRepository,
    catalog: Arc<dyn CatalogBackend>,
    cart_key: String,
    tax_rate: TaxRate,
    shipping: ShippingRules,
    tx: watch::Sender<CartView>,
}

impl CartStore {
    pub fn new(
        repo: CartRepository,
        catalog: Arc<dyn CatalogBackend>,
        cart_key: impl Into<String>,
        tax_rate: TaxRate,
        shipping: ShippingRules,
    ) -> Self {
        let (tx, _rx) = watch::channel(CartView::default());
        CartStore {
            state: Mutex::new(CartState {
                cart: Cart::new(),
                destination: None,
                products: HashMap::new(),
            }),
            repo,
            catalog,
            cart_key: cart_key.into(),
            tax_rate,
            shipping,
            tx,
        }
    }

    /// Loads the persisted cart and re-validates it against current stock.
    ///
    /// If the catalog cannot be reached, lines are checked against the
    /// stock cached on them instead.
    pub async fn hydrate(&self) -> CheckoutResult<RehydrationReport> {
        let persisted = self.repo.load_lines(&self.cart_key).await?;
        let mut state = self.state.lock().await;

        let live = match self.catalog.list_products().await {
            Ok(products) => {
                state.products = index(products);
                true
            }
            Err(e) => {
                warn!(error = %e, "Catalog unavailable during hydration, using cached stock");
                false
            }
        };

        let cached: HashMap<(String, String), u32> = persisted
            .iter()
            .map(|l| ((l.product_id.clone(), l.size.clone()), l.size_stock))
            .collect();
        let products = &state.products;
        let (cart, report) = Cart::rehydrate(persisted, |product_id, size| {
            if !live {
                cached.get(&(product_id.to_string(), size.to_string())).copied()
            } else {
                products.get(product_id).and_then(|p| p.stock_for(size))
            }
        });

        for (product_id, size) in &report.dropped {
            debug!(product_id = %product_id, size = %size, "Dropped unavailable cart line");
        }
        for (product_id, size, from, to) in &report.clamped {
            debug!(product_id = %product_id, size = %size, from, to, "Clamped cart line to stock");
        }
        if !report.is_clean() {
            info!(
                dropped = report.dropped.len(),
                clamped = report.clamped.len(),
                "Cart adjusted to current stock"
            );
        }

        state.cart = cart;
        if !report.is_clean() {
            self.persist(&state).await;
        }
        self.publish(&state);

        Ok(report)
    }

    /// Refreshes the stock snapshot from the catalog.
    ///
    /// Returns the products so callers can render the listing too. Existing
    /// lines are not re-clamped here; the next mutation uses the new stock.
    pub async fn refresh_stock(&self) -> CheckoutResult<Vec<Product>> {
        let products = self
            .catalog
            .list_products()
            .await
            .map_err(crate::error::CheckoutError::Catalog)?;
        let mut state = self.state.lock().await;
        state.products = index(products.clone());
        Ok(products)
    }

    /// Adds one unit. False, with no change, when the size is missing,
    /// sold out or already at its stock ceiling.
    pub async fn add_line(&self, product: &Product, size: Option<&str>) -> bool {
        self.try_add_line(product, size).await.is_ok()
    }

    /// Like [`CartStore::add_line`] but says why a line was refused.
    ///
    /// The ceiling comes from the latest catalog snapshot when the store has
    /// one for this product; the caller's copy is only used for unknown ids.
    pub async fn try_add_line(&self, product: &Product, size: Option<&str>) -> CheckoutResult<u32> {
        let mut state = self.state.lock().await;
        let current = state
            .products
            .entry(product.id.clone())
            .or_insert_with(|| product.clone())
            .clone();
        let quantity = state.cart.try_add_line(&current, size)?;

        debug!(product_id = %product.id, quantity, "Cart line added");
        self.persist(&state).await;
        self.publish(&state);
        Ok(quantity)
    }

    /// Sets a quantity, clamped to `[1, current stock]`. Values below 1 are
    /// ignored.
    pub async fn update_quantity(&self, product_id: &str, size: &str, quantity: i64) -> QuantityChange {
        let mut state = self.state.lock().await;
        let stock = state.current_stock(product_id, size);
        let change = state.cart.update_quantity(product_id, size, quantity, stock);

        match change {
            QuantityChange::Ignored => return change,
            QuantityChange::Set { quantity, clamped } => {
                debug!(product_id = %product_id, size = %size, quantity, clamped, "Cart quantity set")
            }
            QuantityChange::Removed => {
                info!(product_id = %product_id, size = %size, "Cart line removed, size sold out")
            }
        }

        self.persist(&state).await;
        self.publish(&state);
        change
    }

    /// No-op when the line is absent.
    pub async fn remove_line(&self, product_id: &str, size: &str) -> bool {
        let mut state = self.state.lock().await;
        if !state.cart.remove_line(product_id, size) {
            return false;
        }
        self.persist(&state).await;
        self.publish(&state);
        true
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.cart.clear();
        self.persist(&state).await;
        self.publish(&state);
    }

    pub async fn set_destination(&self, destination: Option<Destination>) {
        let mut state = self.state.lock().await;
        state.destination = destination;
        self.publish(&state);
    }

    pub async fn cart(&self) -> Cart {
        self.state.lock().await.cart.clone()
    }

    pub async fn totals(&self) -> OrderTotals {
        let state = self.state.lock().await;
        self.compute_totals(&state)
    }

    /// Totals for an explicit destination, e.g. the one on a checkout form.
    pub async fn totals_for(&self, destination: &Destination) -> OrderTotals {
        let state = self.state.lock().await;
        OrderTotals::compute(&state.cart, self.tax_rate, &self.shipping, Some(destination))
    }

    pub fn view(&self) -> CartView {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.tx.subscribe()
    }

    pub fn shipping_rules(&self) -> &ShippingRules {
        &self.shipping
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    fn compute_totals(&self, state: &CartState) -> OrderTotals {
        OrderTotals::compute(
            &state.cart,
            self.tax_rate,
            &self.shipping,
            state.destination.as_ref(),
        )
    }

    async fn persist(&self, state: &CartState) {
        if let Err(e) = self.repo.save(&self.cart_key, state.cart.lines()).await {
            warn!(cart_key = %self.cart_key, error = %e, "Failed to persist cart");
        }
    }

    fn publish(&self, state: &CartState) {
        self.tx.send_replace(CartView {
            lines: state.cart.lines().to_vec(),
            destination: state.destination.clone(),
            totals: self.compute_totals(state),
        });
    }
}

fn index(products: Vec<Product>) -> HashMap<String, Product> {
    products.into_iter().map(|p| (p.id.clone(), p)).collect()
}
