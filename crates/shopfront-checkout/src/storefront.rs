//! # Storefront Assembly
//!
//! Builds every store and service from one [`ShopfrontConfig`].
//!
//! ```text
//! ShopfrontConfig ──► Database (shopfront.db, migrations)
//!        │
//!        ├──► RateCache ◄── ExchangeRateApiClient (primary)
//!        │              ◄── RatesProxyClient      (fallback)
//!        ├──► DisplayCurrencyStore ──┐
//!        │                           ├──► PriceFormatter
//!        ├──► CartStore ◄── catalog  │
//!        └──► CheckoutOrchestrator ◄─┴── gateway, EmailJsNotifier
//! ```
//!
//! The catalog and payment gateway are supplied by the caller.

use std::sync::Arc;

use tracing::info;

use crate::cart_store::CartStore;
use crate::config::ShopfrontConfig;
use crate::currency_store::DisplayCurrencyStore;
use crate::error::{CheckoutError, CheckoutResult};
use crate::formatter::PriceFormatter;
use crate::http::{EmailJsNotifier, ExchangeRateApiClient, RatesProxyClient};
use crate::orchestrator::CheckoutOrchestrator;
use crate::rates::RateCache;
use crate::services::{CatalogBackend, Clock, NotificationService, PaymentGateway, SystemClock};
use shopfront_core::RehydrationReport;
use shopfront_db::{Database, DbConfig};

pub struct Storefront {
    pub config: ShopfrontConfig,
    pub db: Database,
    pub rates: Arc<RateCache>,
    pub display: Arc<DisplayCurrencyStore>,
    pub formatter: PriceFormatter,
    pub cart: Arc<CartStore>,
    pub checkout: CheckoutOrchestrator,
}

impl Storefront {
    /// Opens the database at the configured path and hydrates the cart.
    pub async fn open(
        config: ShopfrontConfig,
        catalog: Arc<dyn CatalogBackend>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> CheckoutResult<(Self, RehydrationReport)> {
        let path = config
            .database_path()
            .ok_or_else(|| CheckoutError::InvalidConfig("no database path available".into()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CheckoutError::InvalidConfig(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let db = Database::new(DbConfig::new(path)).await?;
        let notifier: Arc<dyn NotificationService> = Arc::new(EmailJsNotifier::new(
            &config.notifications,
            config.call_timeout(),
        ));

        Self::assemble(config, db, catalog, gateway, notifier, Arc::new(SystemClock)).await
    }

    /// Wires the components over an existing database.
    pub async fn assemble(
        config: ShopfrontConfig,
        db: Database,
        catalog: Arc<dyn CatalogBackend>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> CheckoutResult<(Self, RehydrationReport)> {
        let canonical = config.canonical_currency();

        let rates = Arc::new(
            RateCache::new(
                db.rates(),
                Arc::new(ExchangeRateApiClient::from_settings(&config.rates)),
                Arc::new(RatesProxyClient::from_settings(&config.rates)),
                clock.clone(),
            )
            .with_ttl(config.rate_ttl())
            .with_timeout(config.rate_timeout()),
        );

        let display = Arc::new(DisplayCurrencyStore::load(db.preferences(), canonical).await);
        let formatter = PriceFormatter::new(rates.clone(), display.clone(), canonical);

        let cart = Arc::new(CartStore::new(
            db.carts(),
            catalog.clone(),
            config.store.cart_key.clone(),
            config.tax_rate(),
            config.shipping_rules(),
        ));
        let report = cart.hydrate().await?;

        let checkout = CheckoutOrchestrator::new(cart.clone(), catalog, gateway, notifier, &db, clock)
            .with_currency(canonical)
            .with_template(config.notifications.template_id.clone())
            .with_timeout(config.call_timeout());

        let display_currency = display.get();
        info!(
            currency = %canonical,
            display = %display_currency,
            cart_lines = cart.view().lines.len(),
            "Storefront ready"
        );

        Ok((
            Storefront {
                config,
                db,
                rates,
                display,
                formatter,
                cart,
                checkout,
            },
            report,
        ))
    }

    /// Drops follow-ups resolved more than `days_old` days ago.
    pub async fn cleanup_follow_ups(&self, days_old: u32) -> CheckoutResult<u64> {
        let removed = self.db.reconciliation().cleanup_resolved(days_old).await?;
        if removed > 0 {
            info!(removed, "Cleaned up resolved follow-ups");
        }
        Ok(removed)
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
