//! # Checkout Orchestrator
//!
//! Drives one checkout attempt from the contact form to a cleared cart.
//!
//! ## Stages
//! ```text
//!   Idle ──► IntentPending ──► PaymentConfirming ──► StockUpdating ──► Notifying ──► Complete
//!    ▲            │                   │                   │                │
//!    │            ▼                   │ declined          ▼                │ failure is
//!    │   Failed(IntentPending)        │ / timeout   Failed(StockUpdating)  │ logged and
//!    └────────────────────────────────┘             (queued for manual     │ queued, then
//!                                                    reconciliation)       ▼ Complete
//! ```
//!
//! ## Retry Rules
//! - The intent step is safe to repeat: an existing intent is updated, and
//!   a fresh one is created only if the update fails.
//! - Before an existing intent is reused its status is read back from the
//!   gateway, so a confirmation whose answer was lost is not charged twice.
//! - Once the gateway reports the payment as settled the attempt never goes
//!   back to the gateway. A retry resumes at the first unfinished step.
//! - A settled attempt resumes automatically only while the cart is empty or
//!   still holds its order. A new cart starts a new attempt; the old one is
//!   finished by passing its id as `retry_attempt`.
//! - Every stock key that was decremented is recorded on the attempt, so a
//!   retry only decrements what is still pending.
//!
//! The attempt is checkpointed to SQLite after every step and reloaded on
//! start, so these rules hold across restarts too.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::cart_store::CartStore;
use crate::error::{CheckoutError, CheckoutResult, ServiceError};
use crate::services::{
    CatalogBackend, Clock, IntentRequest, Notification, NotificationService, PaymentGateway,
    PaymentIntent, PaymentStatus,
};
use shopfront_core::currency::format_amount;
use shopfront_core::validation::validate_contact;
use shopfront_core::{
    CheckoutAttempt, CheckoutStage, ContactDetails, CurrencyCode, FailedStage, Money,
    OrderSnapshot, ReconciliationEntry, ReconciliationKind, StockKey,
};
use shopfront_db::{CheckoutAttemptRepository, Database, ReconciliationRepository};

const DEFAULT_TEMPLATE: &str = "order_confirmation";

/// Form data for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub contact: ContactDetails,
    /// Opaque payment-method token from the client.
    pub payment_method: String,
    /// Attempt id from an earlier [`CheckoutReport`] to finish that order
    /// instead of the current cart.
    pub retry_attempt: Option<String>,
}

/// Outcome of a checkout that got past payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReport {
    pub attempt_id: String,
    pub intent_id: Option<String>,
    pub order: OrderSnapshot,
    pub stage: CheckoutStage,
    pub stock_reconciled: bool,
    pub notified: bool,
    /// Follow-ups queued during this run.
    pub follow_ups: Vec<ReconciliationKind>,
}

impl CheckoutReport {
    /// Paid, but something is left for an operator.
    pub fn needs_follow_up(&self) -> bool {
        !self.follow_ups.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct PendingStock<'a> {
    product_id: &'a str,
    size: &'a str,
    quantity: u32,
}

pub struct CheckoutOrchestrator {
    cart: Arc<CartStore>,
    catalog: Arc<dyn CatalogBackend>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationService>,
    attempts: CheckoutAttemptRepository,
    reconciliation: ReconciliationRepository,
    clock: Arc<dyn Clock>,
    currency: CurrencyCode,
    template: String,
    timeout: Duration,
    attempt: Mutex<Option<CheckoutAttempt>>,
}

impl CheckoutOrchestrator {
    pub fn new(
        cart: Arc<CartStore>,
        catalog: Arc<dyn CatalogBackend>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationService>,
        db: &Database,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CheckoutOrchestrator {
            cart,
            catalog,
            gateway,
            notifier,
            attempts: db.attempts(),
            reconciliation: db.reconciliation(),
            clock,
            currency: shopfront_core::CANONICAL_CURRENCY,
            template: DEFAULT_TEMPLATE.to_string(),
            timeout: Duration::from_secs(10),
            attempt: Mutex::new(None),
        }
    }

    /// Currency the gateway charges in.
    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }

    /// Notification template for order confirmations.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        let template = template.into();
        if !template.is_empty() {
            self.template = template;
        }
        self
    }

    /// Upper bound on each collaborator call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The attempt in flight, if any.
    pub async fn current_attempt(&self) -> Option<CheckoutAttempt> {
        self.attempt.lock().await.clone()
    }

    /// Unresolved post-payment follow-ups, oldest first.
    pub async fn open_follow_ups(&self, limit: u32) -> CheckoutResult<Vec<ReconciliationEntry>> {
        Ok(self.reconciliation.get_open(limit).await?)
    }

    /// Runs or resumes checkout.
    ///
    /// Errors mean no money moved: validation, intent creation or a
    /// declined payment. Anything after settlement is reported in the
    /// [`CheckoutReport`] instead.
    pub async fn checkout(&self, request: &CheckoutRequest) -> CheckoutResult<CheckoutReport> {
        let mut slot = self
            .attempt
            .try_lock()
            .map_err(|_| CheckoutError::CheckoutInProgress)?;

        if slot.as_ref().map_or(true, |a| !a.is_open()) {
            *slot = match self.attempts.load_open().await {
                Ok(open) => open,
                Err(e) => {
                    warn!(error = %e, "Could not load open checkout attempt");
                    None
                }
            };
        }

        let open = slot.take().filter(CheckoutAttempt::is_open);
        let mut attempt = match request.retry_attempt.as_deref() {
            Some(attempt_id) => self.retry_target(open, attempt_id).await?,
            None => self.resumable(open).await,
        };

        let result = if attempt.settled {
            info!(
                attempt_id = %attempt.attempt_id,
                stage = %attempt.stage,
                "Resuming settled checkout"
            );
            self.finish(&mut attempt).await
        } else {
            self.pay(&mut attempt, request).await
        };

        *slot = Some(attempt);
        result
    }

    /// The open attempt a plain submission continues, or a fresh one.
    ///
    /// A settled attempt is resumed only while the cart still holds its
    /// order or is empty. Anything else in the cart is a new order: the paid
    /// attempt is closed for automatic resume and stays reachable through
    /// `retry_attempt` and its open follow-ups.
    async fn resumable(&self, open: Option<CheckoutAttempt>) -> CheckoutAttempt {
        let Some(attempt) = open else {
            return CheckoutAttempt::new(self.clock.now());
        };
        if !attempt.settled || !attempt.cart_cleared || self.cart.cart().await.is_empty() {
            return attempt;
        }

        warn!(
            attempt_id = %attempt.attempt_id,
            stage = %attempt.stage,
            "Parking settled checkout, cart holds a new order"
        );
        if let Err(e) = self.attempts.close(&attempt.attempt_id).await {
            warn!(attempt_id = %attempt.attempt_id, error = %e, "Failed to park checkout attempt");
        }
        CheckoutAttempt::new(self.clock.now())
    }

    async fn retry_target(
        &self,
        open: Option<CheckoutAttempt>,
        attempt_id: &str,
    ) -> CheckoutResult<CheckoutAttempt> {
        let target = match open {
            Some(attempt) if attempt.attempt_id == attempt_id => Some(attempt),
            _ => self.attempts.get(attempt_id).await?,
        };
        target
            .filter(CheckoutAttempt::is_open)
            .ok_or_else(|| CheckoutError::UnknownAttempt(attempt_id.to_string()))
    }

    // =========================================================================
    // Before settlement
    // =========================================================================

    async fn pay(
        &self,
        attempt: &mut CheckoutAttempt,
        request: &CheckoutRequest,
    ) -> CheckoutResult<CheckoutReport> {
        if let Some(intent_id) = attempt.intent_id.clone() {
            if self.captured_earlier(attempt, &intent_id).await? {
                return self.finish(attempt).await;
            }
        }

        validate_contact(&request.contact, self.cart.shipping_rules())?;

        let cart = self.cart.cart().await;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let totals = self.cart.totals_for(&request.contact.destination()).await;
        let order = OrderSnapshot::from_cart(&cart, totals, request.contact.clone());

        // A confirm that never returned left us here; the intent is reused
        if attempt.stage == CheckoutStage::PaymentConfirming {
            self.advance(attempt, CheckoutStage::Idle)?;
        }
        self.advance(attempt, CheckoutStage::IntentPending)?;
        attempt.order = Some(order.clone());
        self.checkpoint(attempt).await;

        // ---------------------------------------------------------------------
        // Intent
        // ---------------------------------------------------------------------
        let intent_request = IntentRequest {
            amount: totals.total,
            currency: self.currency,
            metadata: intent_metadata(&attempt.attempt_id, &order),
        };

        let intent = match self.obtain_intent(attempt.intent_id.as_deref(), &intent_request).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(attempt_id = %attempt.attempt_id, error = %e, "Payment intent failed");
                attempt.fail(self.clock.now())?;
                self.checkpoint(attempt).await;
                return Err(CheckoutError::IntentFailed(e));
            }
        };

        attempt.intent_id = Some(intent.intent_id.clone());
        attempt.client_secret = Some(intent.client_secret.clone());
        self.advance(attempt, CheckoutStage::PaymentConfirming)?;
        self.checkpoint(attempt).await;

        // ---------------------------------------------------------------------
        // Confirmation
        // ---------------------------------------------------------------------
        let confirmation = self
            .call(
                "payments",
                self.gateway
                    .confirm_payment(&intent.client_secret, &request.payment_method),
            )
            .await;

        let message = match confirmation {
            Ok(c) if c.status.is_settled() => None,
            Ok(c) => Some(c.message.unwrap_or_else(|| match c.status {
                PaymentStatus::Processing => {
                    "Your payment is still processing. Please try again shortly.".to_string()
                }
                PaymentStatus::RequiresAction => {
                    "Your payment needs additional authentication.".to_string()
                }
                _ => "Your payment was declined.".to_string(),
            })),
            Err(e) => Some(e.user_message()),
        };

        if let Some(message) = message {
            info!(
                attempt_id = %attempt.attempt_id,
                intent_id = %intent.intent_id,
                message = %message,
                "Payment not completed"
            );
            self.advance(attempt, CheckoutStage::Idle)?;
            self.checkpoint(attempt).await;
            return Err(CheckoutError::PaymentFailed { message });
        }

        attempt.settled = true;
        self.advance(attempt, CheckoutStage::StockUpdating)?;
        self.checkpoint(attempt).await;
        info!(
            attempt_id = %attempt.attempt_id,
            intent_id = %intent.intent_id,
            total = %totals.total,
            "Payment settled"
        );

        self.finish(attempt).await
    }

    /// Asks the gateway about the attempt's intent before anything is reused.
    /// A confirmation whose answer was lost may still have captured the
    /// payment; in that case the attempt moves on to stock with its old order.
    async fn captured_earlier(&self, attempt: &mut CheckoutAttempt, intent_id: &str) -> CheckoutResult<bool> {
        let status = match self.call("payments", self.gateway.payment_status(intent_id)).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    attempt_id = %attempt.attempt_id,
                    intent_id = %intent_id,
                    error = %e,
                    "Could not check earlier payment"
                );
                return Err(CheckoutError::IntentFailed(e));
            }
        };
        if !status.is_settled() {
            return Ok(false);
        }

        info!(
            attempt_id = %attempt.attempt_id,
            intent_id = %intent_id,
            stage = %attempt.stage,
            "Earlier payment had settled"
        );
        attempt.settled = true;
        if attempt.stage != CheckoutStage::PaymentConfirming {
            self.advance(attempt, CheckoutStage::IntentPending)?;
            self.advance(attempt, CheckoutStage::PaymentConfirming)?;
        }
        self.advance(attempt, CheckoutStage::StockUpdating)?;
        self.checkpoint(attempt).await;
        Ok(true)
    }

    /// Updates the existing intent, or creates one if there is none or the
    /// update fails.
    async fn obtain_intent(
        &self,
        existing: Option<&str>,
        request: &IntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        if let Some(intent_id) = existing {
            match self
                .call("payments", self.gateway.update_intent(intent_id, request))
                .await
            {
                Ok(intent) => return Ok(intent),
                Err(e) => {
                    warn!(intent_id = %intent_id, error = %e, "Intent update failed, creating a new one")
                }
            }
        }
        self.call("payments", self.gateway.create_intent(request)).await
    }

    // =========================================================================
    // After settlement
    // =========================================================================

    async fn finish(&self, attempt: &mut CheckoutAttempt) -> CheckoutResult<CheckoutReport> {
        let mut follow_ups = Vec::new();

        if !attempt.stock_reconciled() {
            self.update_stock(attempt, &mut follow_ups).await?;
        }

        if !attempt.notified {
            self.advance(attempt, CheckoutStage::Notifying)?;
            self.notify(attempt, &mut follow_ups).await;
        }

        if !attempt.cart_cleared {
            self.cart.clear().await;
            attempt.cart_cleared = true;
        }

        if attempt.stock_reconciled() {
            self.advance(attempt, CheckoutStage::Notifying)?;
            self.advance(attempt, CheckoutStage::Complete)?;
            info!(attempt_id = %attempt.attempt_id, "Checkout complete");
        } else {
            self.advance(attempt, CheckoutStage::Failed(FailedStage::StockUpdating))?;
        }
        self.checkpoint(attempt).await;

        let order = attempt
            .order
            .clone()
            .ok_or_else(|| CheckoutError::MissingOrder(attempt.attempt_id.clone()))?;

        Ok(CheckoutReport {
            attempt_id: attempt.attempt_id.clone(),
            intent_id: attempt.intent_id.clone(),
            order,
            stage: attempt.stage,
            stock_reconciled: attempt.stock_reconciled(),
            notified: attempt.notified,
            follow_ups,
        })
    }

    /// Decrements every pending key once, continuing past failures.
    async fn update_stock(
        &self,
        attempt: &mut CheckoutAttempt,
        follow_ups: &mut Vec<ReconciliationKind>,
    ) -> CheckoutResult<()> {
        self.advance(attempt, CheckoutStage::StockUpdating)?;

        let mut failures: Vec<(StockKey, u32, ServiceError)> = Vec::new();
        for (key, quantity) in attempt.pending_stock() {
            let result = self
                .call(
                    "catalog",
                    self.catalog.decrement_stock(&key.product_id, &key.size, quantity),
                )
                .await;

            match result {
                Ok(()) => {
                    info!(attempt_id = %attempt.attempt_id, key = %key, quantity, "Stock decremented");
                    attempt.decremented.insert(key);
                    self.checkpoint(attempt).await;
                }
                Err(e) => failures.push((key, quantity, e)),
            }
        }

        if failures.is_empty() {
            self.resolve(attempt, ReconciliationKind::StockUnreconciled, "stock decremented on retry")
                .await;
            return Ok(());
        }

        let pending: Vec<PendingStock<'_>> = failures
            .iter()
            .map(|(key, quantity, _)| PendingStock {
                product_id: &key.product_id,
                size: &key.size,
                quantity: *quantity,
            })
            .collect();
        let payload = serde_json::to_string(&pending)?;
        let last_error = failures
            .iter()
            .map(|(key, _, e)| format!("{key}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");

        error!(
            attempt_id = %attempt.attempt_id,
            intent_id = attempt.intent_id.as_deref().unwrap_or("-"),
            pending = %payload,
            error = %last_error,
            "Payment settled but stock not reconciled"
        );

        attempt.fail(self.clock.now())?;
        self.checkpoint(attempt).await;
        self.enqueue(attempt, ReconciliationKind::StockUnreconciled, &payload, &last_error)
            .await;
        follow_ups.push(ReconciliationKind::StockUnreconciled);
        Ok(())
    }

    async fn notify(&self, attempt: &mut CheckoutAttempt, follow_ups: &mut Vec<ReconciliationKind>) {
        let Some(order) = attempt.order.as_ref() else {
            return;
        };
        let notification = Notification {
            template: self.template.clone(),
            fields: order_fields(order, self.currency),
        };

        match self.call("notifications", self.notifier.send(&notification)).await {
            Ok(()) => {
                attempt.notified = true;
                self.checkpoint(attempt).await;
                self.resolve(attempt, ReconciliationKind::NotificationFailed, "notification sent on retry")
                    .await;
            }
            Err(e) => {
                warn!(
                    attempt_id = %attempt.attempt_id,
                    error = %e,
                    "Order confirmation could not be sent"
                );
                let payload = serde_json::to_string(&notification.fields).unwrap_or_default();
                self.enqueue(attempt, ReconciliationKind::NotificationFailed, &payload, &e.to_string())
                    .await;
                follow_ups.push(ReconciliationKind::NotificationFailed);
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn call<T, F>(&self, service: &str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ServiceError::Timeout {
                service: service.to_string(),
                seconds: self.timeout.as_secs(),
            })?
    }

    /// Moves to `next` unless already there.
    fn advance(&self, attempt: &mut CheckoutAttempt, next: CheckoutStage) -> CheckoutResult<()> {
        if attempt.stage != next {
            attempt.transition(next, self.clock.now())?;
        }
        Ok(())
    }

    /// Saves the attempt. A failed save is logged; the in-memory attempt
    /// still carries the state for this session.
    async fn checkpoint(&self, attempt: &CheckoutAttempt) {
        if let Err(e) = self.attempts.save(attempt).await {
            error!(
                attempt_id = %attempt.attempt_id,
                stage = %attempt.stage,
                error = %e,
                "Failed to persist checkout attempt"
            );
        }
    }

    async fn enqueue(&self, attempt: &CheckoutAttempt, kind: ReconciliationKind, payload: &str, last_error: &str) {
        if let Err(e) = self
            .reconciliation
            .enqueue(
                kind,
                &attempt.attempt_id,
                attempt.intent_id.as_deref(),
                payload,
                last_error,
            )
            .await
        {
            error!(
                attempt_id = %attempt.attempt_id,
                ?kind,
                payload = %payload,
                error = %e,
                "Failed to queue follow-up"
            );
        }
    }

    async fn resolve(&self, attempt: &CheckoutAttempt, kind: ReconciliationKind, note: &str) {
        match self
            .reconciliation
            .resolve_for_attempt(&attempt.attempt_id, kind, note)
            .await
        {
            Ok(0) => {}
            Ok(n) => info!(attempt_id = %attempt.attempt_id, ?kind, resolved = n, "Follow-up resolved"),
            Err(e) => warn!(attempt_id = %attempt.attempt_id, error = %e, "Failed to resolve follow-up"),
        }
    }
}

fn intent_metadata(attempt_id: &str, order: &OrderSnapshot) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("attempt_id".to_string(), attempt_id.to_string());
    metadata.insert("customer_name".to_string(), order.contact.name.trim().to_string());
    metadata.insert("customer_email".to_string(), order.contact.email.trim().to_string());
    metadata.insert("order".to_string(), order.summary());
    metadata
}

fn money(amount: Money, currency: CurrencyCode) -> String {
    format_amount(amount.to_decimal(), currency)
}

/// Template fields of the order confirmation.
fn order_fields(order: &OrderSnapshot, currency: CurrencyCode) -> BTreeMap<String, String> {
    let contact = &order.contact;
    let totals = &order.totals;

    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), contact.name.trim().to_string());
    fields.insert("email".to_string(), contact.email.trim().to_string());
    fields.insert("phone".to_string(), contact.phone.trim().to_string());
    fields.insert("address".to_string(), contact.full_address());
    fields.insert("order".to_string(), order.summary());
    fields.insert("subtotal".to_string(), money(totals.subtotal, currency));
    fields.insert("tax".to_string(), money(totals.tax, currency));
    fields.insert("shipping".to_string(), money(totals.shipping, currency));
    fields.insert("total".to_string(), money(totals.total, currency));
    fields.insert("currency".to_string(), currency.to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_db, product, ManualClock, MockCatalog, RecordingNotifier, ScriptedGateway};
    use shopfront_core::{Product, ShippingRules, TaxRate};

    struct Shop {
        db: Database,
        catalog: Arc<MockCatalog>,
        gateway: Arc<ScriptedGateway>,
        notifier: Arc<RecordingNotifier>,
        cart: Arc<CartStore>,
        orchestrator: CheckoutOrchestrator,
    }

    impl Shop {
        fn orchestrator(&self) -> CheckoutOrchestrator {
            CheckoutOrchestrator::new(
                self.cart.clone(),
                self.catalog.clone(),
                self.gateway.clone(),
                self.notifier.clone(),
                &self.db,
                Arc::new(ManualClock::new()),
            )
        }
    }

    fn hoodie() -> Product {
        product("hoodie", "Heavy Hoodie", 5_000, &[("M", 5), ("L", 1)])
    }

    async fn shop() -> Shop {
        let db = memory_db().await;
        let catalog = Arc::new(MockCatalog::new(vec![hoodie()]));
        let cart = Arc::new(CartStore::new(
            db.carts(),
            catalog.clone(),
            "default",
            TaxRate::default(),
            ShippingRules::default(),
        ));
        cart.hydrate().await.unwrap();

        let gateway = Arc::new(ScriptedGateway::approving());
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = CheckoutOrchestrator::new(
            cart.clone(),
            catalog.clone(),
            gateway.clone(),
            notifier.clone(),
            &db,
            Arc::new(ManualClock::new()),
        );

        Shop {
            db,
            catalog,
            gateway,
            notifier,
            cart,
            orchestrator,
        }
    }

    async fn two_hoodies(shop: &Shop) {
        assert!(shop.cart.add_line(&hoodie(), Some("M")).await);
        shop.cart.update_quantity("hoodie", "M", 2).await;
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            contact: ContactDetails {
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                phone: "416-555-0100".into(),
                address: "1 King St".into(),
                city: "Toronto".into(),
                region: "ON".into(),
                country: "CA".into(),
                postal: "M5H 1A1".into(),
            },
            payment_method: "pm_card_visa".into(),
            retry_attempt: None,
        }
    }

    #[tokio::test]
    async fn test_local_order_totals_and_completes() {
        let shop = shop().await;
        two_hoodies(&shop).await;

        let report = shop.orchestrator.checkout(&request()).await.unwrap();

        let totals = report.order.totals;
        assert_eq!(totals.subtotal, Money::from_cents(10_000));
        assert_eq!(totals.tax, Money::from_cents(200));
        assert_eq!(totals.shipping, Money::zero());
        assert_eq!(totals.total, Money::from_cents(10_200));

        assert_eq!(report.stage, CheckoutStage::Complete);
        assert!(report.stock_reconciled);
        assert!(report.notified);
        assert!(!report.needs_follow_up());

        assert!(shop.cart.cart().await.is_empty());
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(3));
        assert_eq!(
            shop.gateway.last_request().unwrap().amount,
            Money::from_cents(10_200)
        );

        let fields = shop.notifier.last_fields().unwrap();
        assert_eq!(fields["order"], "2x Heavy Hoodie (Size: M)");
        assert_eq!(fields["total"], "C$102.00");
        assert_eq!(fields["address"], "1 King St, Toronto, ON, CA, M5H 1A1");
        assert_eq!(fields["currency"], "CAD");

        // History, not resumable
        assert!(shop.db.attempts().load_open().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stock_failure_after_payment_then_retry() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.catalog.fail_decrements(true);

        let report = shop.orchestrator.checkout(&request()).await.unwrap();
        assert_eq!(report.stage, CheckoutStage::Failed(FailedStage::StockUpdating));
        assert!(!report.stock_reconciled);
        assert_eq!(report.follow_ups, vec![ReconciliationKind::StockUnreconciled]);

        // The shopper still sees success
        assert!(shop.cart.cart().await.is_empty());
        assert!(report.notified);
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(5));
        assert_eq!(shop.db.reconciliation().count_open().await.unwrap(), 1);

        shop.catalog.fail_decrements(false);
        let retry = shop.orchestrator.checkout(&request()).await.unwrap();

        assert_eq!(retry.attempt_id, report.attempt_id);
        assert_eq!(retry.stage, CheckoutStage::Complete);
        assert!(retry.stock_reconciled);
        assert_eq!(shop.gateway.intents_created(), 1);
        assert_eq!(shop.gateway.confirmations(), 1);
        assert_eq!(shop.catalog.decrements().len(), 1);
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(3));
        assert_eq!(shop.notifier.sent().len(), 1);
        assert_eq!(shop.db.reconciliation().count_open().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retry_only_decrements_pending_keys() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        let cap = product("cap", "Cap", 2_500, &[("OS", 4)]);
        shop.cart.add_line(&cap, Some("OS")).await;

        // The catalog does not know the cap, so only the hoodie decrement lands
        let report = shop.orchestrator.checkout(&request()).await.unwrap();
        assert!(!report.stock_reconciled);
        assert_eq!(shop.catalog.decrements(), vec![("hoodie".into(), "M".into(), 2)]);

        let open = shop.orchestrator.open_follow_ups(10).await.unwrap();
        assert_eq!(open.len(), 1);
        assert!(open[0].payload.contains("\"cap\""));
        assert!(!open[0].payload.contains("hoodie"));

        let attempt = shop.orchestrator.current_attempt().await.unwrap();
        assert!(attempt.decremented.contains(&StockKey::new("hoodie", "M")));

        shop.orchestrator.checkout(&request()).await.unwrap();
        assert_eq!(shop.catalog.decrements().len(), 1);
        assert_eq!(shop.db.reconciliation().get_open(10).await.unwrap()[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_settled_attempt_resumes_after_restart() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.catalog.fail_decrements(true);
        let first = shop.orchestrator.checkout(&request()).await.unwrap();

        shop.catalog.fail_decrements(false);
        let restarted = shop.orchestrator();
        let report = restarted.checkout(&request()).await.unwrap();

        assert_eq!(report.attempt_id, first.attempt_id);
        assert_eq!(report.stage, CheckoutStage::Complete);
        assert_eq!(shop.gateway.intents_created(), 1);
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(3));
    }

    #[tokio::test]
    async fn test_new_cart_after_unreconciled_payment_is_charged() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.catalog.fail_decrements(true);
        let first = shop.orchestrator.checkout(&request()).await.unwrap();
        assert_eq!(first.stage, CheckoutStage::Failed(FailedStage::StockUpdating));

        shop.catalog.fail_decrements(false);
        assert!(shop.cart.add_line(&hoodie(), Some("L")).await);
        let second = shop.orchestrator.checkout(&request()).await.unwrap();

        assert_ne!(second.attempt_id, first.attempt_id);
        assert_eq!(second.stage, CheckoutStage::Complete);
        assert_eq!(second.order.totals.subtotal, Money::from_cents(5_000));
        assert_eq!(shop.gateway.intents_created(), 2);
        assert_eq!(shop.gateway.confirmations(), 2);
        assert_eq!(
            shop.gateway.last_request().unwrap().amount,
            second.order.totals.total
        );
        assert!(shop.cart.cart().await.is_empty());
        assert_eq!(shop.catalog.stock("hoodie", "L"), Some(0));
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(5));

        // The first order still waits for its stock
        let open = shop.orchestrator.open_follow_ups(10).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].attempt_id, first.attempt_id);
        assert_eq!(open[0].kind, ReconciliationKind::StockUnreconciled);

        let mut retry = request();
        retry.retry_attempt = Some(first.attempt_id.clone());
        let resumed = shop.orchestrator.checkout(&retry).await.unwrap();

        assert_eq!(resumed.attempt_id, first.attempt_id);
        assert_eq!(resumed.stage, CheckoutStage::Complete);
        assert_eq!(shop.gateway.confirmations(), 2);
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(3));
        assert_eq!(shop.db.reconciliation().count_open().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retry_of_unknown_or_finished_attempt_is_refused() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        let done = shop.orchestrator.checkout(&request()).await.unwrap();

        for attempt_id in ["missing", done.attempt_id.as_str()] {
            let mut retry = request();
            retry.retry_attempt = Some(attempt_id.to_string());
            let err = shop.orchestrator.checkout(&retry).await.unwrap_err();
            assert!(matches!(&err, CheckoutError::UnknownAttempt(id) if id == attempt_id));
        }
        assert_eq!(shop.gateway.confirmations(), 1);
    }

    #[tokio::test]
    async fn test_restart_mid_confirmation_does_not_charge_twice() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        let gate = shop.gateway.hold_confirmations();

        // The process dies while the gateway is capturing
        let req = request();
        tokio::select! {
            _ = shop.orchestrator.checkout(&req) => panic!("confirmation should be held"),
            _ = gate.reached() => {}
        }
        gate.release();

        let stuck = shop.db.attempts().load_open().await.unwrap().unwrap();
        assert_eq!(stuck.stage, CheckoutStage::PaymentConfirming);
        assert!(!stuck.settled);
        assert_eq!(shop.gateway.status_of("pi_1"), Some(PaymentStatus::Succeeded));

        // A captured intent can no longer be updated
        shop.gateway.fail_update(true);
        let restarted = shop.orchestrator();
        let report = restarted.checkout(&request()).await.unwrap();

        assert_eq!(report.attempt_id, stuck.attempt_id);
        assert_eq!(report.intent_id.as_deref(), Some("pi_1"));
        assert_eq!(report.stage, CheckoutStage::Complete);
        assert_eq!(report.order.totals.total, Money::from_cents(10_200));
        assert_eq!(shop.gateway.intents_created(), 1);
        assert_eq!(shop.gateway.confirmations(), 1);
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(3));
        assert!(shop.cart.cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_lost_confirmation_is_recovered_on_retry() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.gateway.lose_confirm_response(true);

        let err = shop.orchestrator.checkout(&request()).await.unwrap_err();
        assert!(err.is_payment_failure());
        assert_eq!(shop.cart.cart().await.total_quantity(), 2);

        shop.gateway.lose_confirm_response(false);
        shop.gateway.fail_update(true);
        let report = shop.orchestrator.checkout(&request()).await.unwrap();

        assert_eq!(report.stage, CheckoutStage::Complete);
        assert_eq!(report.intent_id.as_deref(), Some("pi_1"));
        assert_eq!(shop.gateway.intents_created(), 1);
        assert_eq!(shop.gateway.confirmations(), 1);
        assert_eq!(shop.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_checkout_is_refused() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        let gate = shop.gateway.hold_confirmations();

        let req = request();
        let (first, second) = tokio::join!(shop.orchestrator.checkout(&req), async {
            gate.reached().await;
            let second = shop.orchestrator.checkout(&req).await;
            gate.release();
            second
        });

        assert!(matches!(second, Err(CheckoutError::CheckoutInProgress)));
        assert!(second.unwrap_err().is_retryable());
        assert_eq!(first.unwrap().stage, CheckoutStage::Complete);
        assert_eq!(shop.gateway.intents_created(), 1);
        assert_eq!(shop.gateway.confirmations(), 1);
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(3));
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_cart_and_stock() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.gateway.decline_with("Your card was declined.");

        let err = shop.orchestrator.checkout(&request()).await.unwrap_err();
        match &err {
            CheckoutError::PaymentFailed { message } => assert_eq!(message, "Your card was declined."),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_payment_failure());
        assert_eq!(shop.cart.cart().await.total_quantity(), 2);
        assert_eq!(shop.catalog.stock("hoodie", "M"), Some(5));
        assert!(shop.notifier.sent().is_empty());

        let attempt = shop.orchestrator.current_attempt().await.unwrap();
        assert_eq!(attempt.stage, CheckoutStage::Idle);
        assert!(!attempt.settled);

        // Same intent is refreshed on the next try
        shop.gateway.approve();
        let report = shop.orchestrator.checkout(&request()).await.unwrap();
        assert_eq!(report.stage, CheckoutStage::Complete);
        assert_eq!(report.intent_id.as_deref(), Some("pi_1"));
        assert_eq!(shop.gateway.intents_created(), 1);
        assert_eq!(shop.gateway.intents_updated(), 1);
    }

    #[tokio::test]
    async fn test_gateway_error_maps_to_user_message() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.gateway
            .fail_confirm_with(ServiceError::rejected("payments", "Insufficient funds."));

        let err = shop.orchestrator.checkout(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Payment failed: Insufficient funds.");
    }

    #[tokio::test]
    async fn test_failed_update_falls_back_to_new_intent() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.gateway.decline_with("declined");
        shop.orchestrator.checkout(&request()).await.unwrap_err();

        shop.gateway.fail_update(true);
        shop.gateway.approve();
        let report = shop.orchestrator.checkout(&request()).await.unwrap();

        assert_eq!(report.intent_id.as_deref(), Some("pi_2"));
        assert_eq!(shop.gateway.intents_created(), 2);
    }

    #[tokio::test]
    async fn test_intent_failure_is_retryable_and_side_effect_free() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.gateway.fail_create(true);

        let err = shop.orchestrator.checkout(&request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::IntentFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(
            shop.orchestrator.current_attempt().await.unwrap().stage,
            CheckoutStage::Failed(FailedStage::IntentPending)
        );
        assert_eq!(shop.gateway.confirmations(), 0);

        shop.gateway.fail_create(false);
        let report = shop.orchestrator.checkout(&request()).await.unwrap();
        assert_eq!(report.stage, CheckoutStage::Complete);
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_call() {
        let shop = shop().await;

        let err = shop.orchestrator.checkout(&request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        two_hoodies(&shop).await;
        let mut bad = request();
        bad.contact.email = "ada.example.com".into();
        let err = shop.orchestrator.checkout(&bad).await.unwrap_err();
        assert!(err.is_validation());

        let mut bad = request();
        bad.contact.region = String::new();
        assert!(shop.orchestrator.checkout(&bad).await.unwrap_err().is_validation());

        assert_eq!(shop.gateway.intents_created(), 0);
    }

    #[tokio::test]
    async fn test_notification_failure_still_completes() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        shop.notifier.fail(true);

        let report = shop.orchestrator.checkout(&request()).await.unwrap();
        assert_eq!(report.stage, CheckoutStage::Complete);
        assert!(!report.notified);
        assert_eq!(report.follow_ups, vec![ReconciliationKind::NotificationFailed]);
        assert!(shop.cart.cart().await.is_empty());

        let open = shop.orchestrator.open_follow_ups(10).await.unwrap();
        assert_eq!(open[0].kind, ReconciliationKind::NotificationFailed);
        assert!(open[0].payload.contains("C$102.00"));
    }

    #[tokio::test]
    async fn test_international_order_charges_shipping() {
        let shop = shop().await;
        two_hoodies(&shop).await;
        let mut req = request();
        req.contact.country = "US".into();
        req.contact.region = String::new();

        let report = shop.orchestrator.checkout(&req).await.unwrap();
        assert_eq!(report.order.totals.shipping, Money::from_cents(3_000));
        assert_eq!(report.order.totals.total, Money::from_cents(13_200));
    }
}
