//! HTTP implementations of the collaborator traits.
//!
//! - [`ExchangeRateApiClient`]: primary rates, ExchangeRate-API v6 pair endpoint
//! - [`RatesProxyClient`]: fallback rates, the storefront's own `rates-api`
//! - [`EmailJsNotifier`]: order confirmations through the EmailJS REST API

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{NotificationSettings, RateSettings};
use crate::error::ServiceError;
use crate::services::{Notification, NotificationService, RateProvider};
use shopfront_core::CurrencyCode;

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn decimal_rate(service: &str, value: f64) -> Result<Decimal, ServiceError> {
    Decimal::from_f64(value)
        .filter(|rate| *rate > Decimal::ZERO)
        .ok_or_else(|| ServiceError::invalid(service, format!("unusable rate {value}")))
}

// =============================================================================
// ExchangeRate-API
// =============================================================================

pub struct ExchangeRateApiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    conversion_rate: Option<f64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

impl ExchangeRateApiClient {
    const NAME: &'static str = "exchangerate-api";

    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: build_client(timeout),
        }
    }

    pub fn from_settings(settings: &RateSettings) -> Self {
        Self::new(
            settings.primary_url.clone(),
            settings.primary_api_key.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApiClient {
    async fn get_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<Decimal, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::unavailable(Self::NAME, "API key not configured"))?;

        let url = format!("{}/{}/pair/{}/{}", self.base_url, api_key, from, to);
        debug!(%from, %to, "Fetching rate from ExchangeRate-API");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: PairResponse = response.json().await?;

        if body.result != "success" {
            return Err(ServiceError::rejected(
                Self::NAME,
                format!(
                    "Exchange API error: {}",
                    body.error_type.as_deref().unwrap_or("Unknown error")
                ),
            ));
        }

        let rate = body
            .conversion_rate
            .ok_or_else(|| ServiceError::invalid(Self::NAME, "missing conversion_rate"))?;
        decimal_rate(Self::NAME, rate)
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

// =============================================================================
// rates-api (fallback)
// =============================================================================

pub struct RatesProxyClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    rate: f64,
}

impl RatesProxyClient {
    const NAME: &'static str = "rates-api";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout),
        }
    }

    pub fn from_settings(settings: &RateSettings) -> Self {
        Self::new(
            settings.fallback_url.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

#[async_trait]
impl RateProvider for RatesProxyClient {
    async fn get_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<Decimal, ServiceError> {
        let url = format!("{}/api/rates", self.base_url);
        debug!(%from, %to, "Fetching rate from rates-api");

        let response = self
            .client
            .get(&url)
            .query(&[("from", from.as_str()), ("to", to.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let body: ProxyResponse = response.json().await?;

        decimal_rate(Self::NAME, body.rate)
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

// =============================================================================
// EmailJS
// =============================================================================

pub struct EmailJsNotifier {
    endpoint: String,
    service_id: String,
    public_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a BTreeMap<String, String>,
}

impl EmailJsNotifier {
    const NAME: &'static str = "emailjs";

    pub fn new(settings: &NotificationSettings, timeout: Duration) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            service_id: settings.service_id.clone(),
            public_key: settings.public_key.clone(),
            client: build_client(timeout),
        }
    }
}

#[async_trait]
impl NotificationService for EmailJsNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), ServiceError> {
        if self.service_id.is_empty() || self.public_key.is_empty() || notification.template.is_empty() {
            return Err(ServiceError::unavailable(Self::NAME, "EmailJS is not configured"));
        }

        let request = SendRequest {
            service_id: &self.service_id,
            template_id: &notification.template,
            user_id: &self.public_key,
            template_params: &notification.fields,
        };

        let response = self
            .client
            .post(format!("{}/api/v1.0/email/send", self.endpoint))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::rejected(
                Self::NAME,
                format!("EmailJS responded with {}: {}", status, text),
            ));
        }

        debug!(template = %notification.template, "Notification sent");
        Ok(())
    }
}
