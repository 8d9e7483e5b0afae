//! Hand-written collaborator doubles shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::Notify;

use crate::error::ServiceError;
use crate::services::{
    CatalogBackend, Clock, IntentRequest, Notification, NotificationService, PaymentConfirmation,
    PaymentGateway, PaymentIntent, PaymentStatus, RateProvider,
};
use shopfront_core::{CurrencyCode, Money, Product, SizeStock};
use shopfront_db::{Database, DbConfig};

pub(crate) async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) fn product(id: &str, name: &str, cents: i64, sizes: &[(&str, u32)]) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        price: Money::from_cents(cents),
        category: None,
        description: None,
        sizes: sizes
            .iter()
            .map(|(size, stock)| SizeStock {
                size: size.to_string(),
                stock: *stock,
            })
            .collect(),
        image_urls: Vec::new(),
    }
}

// =============================================================================
// Clock
// =============================================================================

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        ManualClock {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// Rates
// =============================================================================

pub(crate) struct ScriptedRateProvider {
    name: String,
    rate: Mutex<Option<Decimal>>,
    calls: AtomicUsize,
}

impl ScriptedRateProvider {
    pub(crate) fn returning(name: &str, rate: Decimal) -> Self {
        ScriptedRateProvider {
            name: name.to_string(),
            rate: Mutex::new(Some(rate)),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(name: &str) -> Self {
        ScriptedRateProvider {
            name: name.to_string(),
            rate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// `None` makes every following call fail.
    pub(crate) fn set_rate(&self, rate: Option<Decimal>) {
        *self.rate.lock().unwrap() = rate;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for ScriptedRateProvider {
    async fn get_rate(&self, _from: CurrencyCode, _to: CurrencyCode) -> Result<Decimal, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rate = *self.rate.lock().unwrap();
        rate.ok_or_else(|| ServiceError::unavailable(&self.name, "scripted outage"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Catalog
// =============================================================================

pub(crate) struct MockCatalog {
    products: Mutex<Vec<Product>>,
    fail_decrements: AtomicBool,
    fail_listing: AtomicBool,
    decrements: Mutex<Vec<(String, String, u32)>>,
}

impl MockCatalog {
    pub(crate) fn new(products: Vec<Product>) -> Self {
        MockCatalog {
            products: Mutex::new(products),
            fail_decrements: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
            decrements: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn stock(&self, product_id: &str, size: &str) -> Option<u32> {
        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == product_id)
            .and_then(|p| p.stock_for(size))
    }

    pub(crate) fn set_stock(&self, product_id: &str, size: &str, stock: u32) {
        let mut products = self.products.lock().unwrap();
        if let Some(entry) = products
            .iter_mut()
            .find(|p| p.id == product_id)
            .and_then(|p| p.sizes.iter_mut().find(|s| s.size == size))
        {
            entry.stock = stock;
        }
    }

    pub(crate) fn fail_decrements(&self, fail: bool) {
        self.fail_decrements.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Successful decrements, in call order.
    pub(crate) fn decrements(&self) -> Vec<(String, String, u32)> {
        self.decrements.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogBackend for MockCatalog {
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("catalog", "scripted outage"));
        }
        Ok(self.products.lock().unwrap().clone())
    }

    async fn decrement_stock(
        &self,
        product_id: &str,
        size: &str,
        quantity: u32,
    ) -> Result<(), ServiceError> {
        if self.fail_decrements.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("catalog", "inventory backend unavailable"));
        }

        let mut products = self.products.lock().unwrap();
        let entry = products
            .iter_mut()
            .find(|p| p.id == product_id)
            .and_then(|p| p.sizes.iter_mut().find(|s| s.size == size))
            .ok_or_else(|| ServiceError::rejected("catalog", "unknown product or size"))?;
        entry.stock = entry.stock.saturating_sub(quantity);

        self.decrements
            .lock()
            .unwrap()
            .push((product_id.to_string(), size.to_string(), quantity));
        Ok(())
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Holds confirmations until released.
#[derive(Default)]
pub(crate) struct ConfirmGate {
    reached: Notify,
    release: Notify,
}

impl ConfirmGate {
    /// Resolves once a confirmation is waiting at the gate.
    pub(crate) async fn reached(&self) {
        self.reached.notified().await;
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

pub(crate) struct ScriptedGateway {
    created: AtomicUsize,
    updated: AtomicUsize,
    confirmations: AtomicUsize,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    lose_confirm_response: AtomicBool,
    confirm_outcome: Mutex<Result<PaymentConfirmation, ServiceError>>,
    statuses: Mutex<BTreeMap<String, PaymentStatus>>,
    gate: Mutex<Option<Arc<ConfirmGate>>>,
    last_request: Mutex<Option<IntentRequest>>,
}

impl ScriptedGateway {
    pub(crate) fn approving() -> Self {
        ScriptedGateway {
            created: AtomicUsize::new(0),
            updated: AtomicUsize::new(0),
            confirmations: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            lose_confirm_response: AtomicBool::new(false),
            confirm_outcome: Mutex::new(Ok(PaymentConfirmation {
                status: PaymentStatus::Succeeded,
                message: None,
            })),
            statuses: Mutex::new(BTreeMap::new()),
            gate: Mutex::new(None),
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn decline_with(&self, message: &str) {
        *self.confirm_outcome.lock().unwrap() = Ok(PaymentConfirmation {
            status: PaymentStatus::Declined,
            message: Some(message.to_string()),
        });
    }

    pub(crate) fn fail_confirm_with(&self, error: ServiceError) {
        *self.confirm_outcome.lock().unwrap() = Err(error);
    }

    pub(crate) fn approve(&self) {
        *self.confirm_outcome.lock().unwrap() = Ok(PaymentConfirmation {
            status: PaymentStatus::Succeeded,
            message: None,
        });
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    /// The gateway applies the confirmation but the caller gets a timeout.
    pub(crate) fn lose_confirm_response(&self, lose: bool) {
        self.lose_confirm_response.store(lose, Ordering::SeqCst);
    }

    /// Every later confirmation waits at the returned gate.
    pub(crate) fn hold_confirmations(&self) -> Arc<ConfirmGate> {
        let gate = Arc::new(ConfirmGate::default());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn status_of(&self, intent_id: &str) -> Option<PaymentStatus> {
        self.statuses.lock().unwrap().get(intent_id).copied()
    }

    pub(crate) fn intents_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn intents_updated(&self) -> usize {
        self.updated.load(Ordering::SeqCst)
    }

    pub(crate) fn confirmations(&self) -> usize {
        self.confirmations.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<IntentRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ServiceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("payments", "scripted outage"));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.statuses
            .lock()
            .unwrap()
            .insert(format!("pi_{n}"), PaymentStatus::RequiresAction);
        Ok(PaymentIntent {
            intent_id: format!("pi_{n}"),
            client_secret: format!("pi_{n}_secret"),
        })
    }

    async fn update_intent(
        &self,
        intent_id: &str,
        request: &IntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(ServiceError::rejected("payments", "intent can no longer be updated"));
        }
        self.updated.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(PaymentIntent {
            intent_id: intent_id.to_string(),
            client_secret: format!("{intent_id}_secret"),
        })
    }

    async fn confirm_payment(
        &self,
        client_secret: &str,
        _payment_method: &str,
    ) -> Result<PaymentConfirmation, ServiceError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        let outcome = self.confirm_outcome.lock().unwrap().clone();

        if let Ok(confirmation) = &outcome {
            let intent_id = client_secret.trim_end_matches("_secret").to_string();
            self.statuses
                .lock()
                .unwrap()
                .insert(intent_id, confirmation.status);
        }

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }

        if self.lose_confirm_response.load(Ordering::SeqCst) {
            return Err(ServiceError::Timeout {
                service: "payments".into(),
                seconds: 10,
            });
        }
        outcome
    }

    async fn payment_status(&self, intent_id: &str) -> Result<PaymentStatus, ServiceError> {
        self.statuses
            .lock()
            .unwrap()
            .get(intent_id)
            .copied()
            .ok_or_else(|| ServiceError::rejected("payments", "no such intent"))
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn last_fields(&self) -> Option<BTreeMap<String, String>> {
        self.sent.lock().unwrap().last().map(|n| n.fields.clone())
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("email", "smtp relay down"));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
