//! # Storefront Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPFRONT_EXCHANGE_API_KEY=...                                     │
//! │     SHOPFRONT_DATABASE_PATH=/var/lib/shopfront/shopfront.db            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/shopfront/shopfront.toml (Linux)                         │
//! │     ~/Library/Application Support/com.shopfront.shopfront/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     CAD, 2% tax, free shipping in CA/ON, 12h rate TTL                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! canonical_currency = "CAD"
//! tax_rate_bps = 200
//! cart_key = "default"
//!
//! [shipping]
//! domestic_country = "CA"
//! local_regions = ["ON"]
//! domestic_rate_cents = 1500
//! international_rate_cents = 3000
//!
//! [rates]
//! ttl_hours = 12
//! primary_url = "https://v6.exchangerate-api.com/v6"
//! fallback_url = "http://localhost:4242"
//! timeout_secs = 10
//!
//! [checkout]
//! timeout_secs = 10
//!
//! [notifications]
//! endpoint = "https://api.emailjs.com"
//! service_id = "service_abc"
//! template_id = "template_order"
//! public_key = "pk_live_..."
//!
//! [database]
//! path = "/var/lib/shopfront/shopfront.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CheckoutError, CheckoutResult};
use shopfront_core::{CurrencyCode, Money, ShippingRules, TaxRate, CANONICAL_CURRENCY};

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Currency every price and total is kept in.
    #[serde(default = "default_canonical_currency")]
    pub canonical_currency: CurrencyCode,

    /// Sales tax in basis points (200 = 2%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Name of this device's local cart.
    #[serde(default = "default_cart_key")]
    pub cart_key: String,
}

fn default_canonical_currency() -> CurrencyCode {
    CANONICAL_CURRENCY
}

fn default_tax_rate_bps() -> u32 {
    shopfront_core::DEFAULT_TAX_RATE_BPS
}

fn default_cart_key() -> String {
    shopfront_core::DEFAULT_CART_KEY.to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            canonical_currency: default_canonical_currency(),
            tax_rate_bps: default_tax_rate_bps(),
            cart_key: default_cart_key(),
        }
    }
}

// =============================================================================
// Shipping
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSettings {
    #[serde(default = "default_domestic_country")]
    pub domestic_country: String,

    /// Regions of the domestic country that ship free.
    #[serde(default = "default_local_regions")]
    pub local_regions: Vec<String>,

    #[serde(default = "default_domestic_rate")]
    pub domestic_rate_cents: i64,

    #[serde(default = "default_international_rate")]
    pub international_rate_cents: i64,
}

fn default_domestic_country() -> String {
    "CA".to_string()
}

fn default_local_regions() -> Vec<String> {
    vec!["ON".to_string()]
}

fn default_domestic_rate() -> i64 {
    1_500
}

fn default_international_rate() -> i64 {
    3_000
}

impl Default for ShippingSettings {
    fn default() -> Self {
        ShippingSettings {
            domestic_country: default_domestic_country(),
            local_regions: default_local_regions(),
            domestic_rate_cents: default_domestic_rate(),
            international_rate_cents: default_international_rate(),
        }
    }
}

// =============================================================================
// Rates
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSettings {
    /// Hours a fetched rate stays fresh.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,

    /// ExchangeRate-API v6 base URL.
    #[serde(default = "default_primary_url")]
    pub primary_url: String,

    /// Without a key the primary service is skipped as failed.
    #[serde(default)]
    pub primary_api_key: Option<String>,

    /// Base URL of the storefront's own rates service.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ttl_hours() -> i64 {
    shopfront_core::RATE_TTL_HOURS
}

fn default_primary_url() -> String {
    "https://v6.exchangerate-api.com/v6".to_string()
}

fn default_fallback_url() -> String {
    "http://localhost:4242".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RateSettings {
    fn default() -> Self {
        RateSettings {
            ttl_hours: default_ttl_hours(),
            primary_url: default_primary_url(),
            primary_api_key: None,
            fallback_url: default_fallback_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// =============================================================================
// Checkout & Notifications
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Upper bound on each payment, catalog or notification call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// EmailJS REST settings for order confirmations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_notification_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub service_id: String,

    #[serde(default)]
    pub template_id: String,

    #[serde(default)]
    pub public_key: String,
}

fn default_notification_endpoint() -> String {
    "https://api.emailjs.com".to_string()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            endpoint: default_notification_endpoint(),
            service_id: String::new(),
            template_id: String::new(),
            public_key: String::new(),
        }
    }
}

impl NotificationSettings {
    /// All three identifiers are needed to send anything.
    pub fn is_configured(&self) -> bool {
        !self.service_id.is_empty() && !self.template_id.is_empty() && !self.public_key.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Defaults to `shopfront.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopfrontConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub shipping: ShippingSettings,

    #[serde(default)]
    pub rates: RateSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl ShopfrontConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (shopfront.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> CheckoutResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> CheckoutResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| CheckoutError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CheckoutError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| CheckoutError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Storefront config saved");
        Ok(())
    }

    pub fn validate(&self) -> CheckoutResult<()> {
        if self.store.tax_rate_bps > 10_000 {
            return Err(CheckoutError::InvalidConfig(format!(
                "tax_rate_bps must be at most 10000, got {}",
                self.store.tax_rate_bps
            )));
        }

        if self.store.cart_key.trim().is_empty() {
            return Err(CheckoutError::InvalidConfig("cart_key must not be empty".into()));
        }

        let country = self.shipping.domestic_country.trim();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CheckoutError::InvalidConfig(format!(
                "domestic_country must be a two-letter code, got: {}",
                self.shipping.domestic_country
            )));
        }

        if self.shipping.domestic_rate_cents < 0 || self.shipping.international_rate_cents < 0 {
            return Err(CheckoutError::InvalidConfig(
                "shipping rates must not be negative".into(),
            ));
        }

        if self.rates.ttl_hours <= 0 {
            return Err(CheckoutError::InvalidConfig("ttl_hours must be greater than 0".into()));
        }

        if self.rates.timeout_secs == 0 || self.checkout.timeout_secs == 0 {
            return Err(CheckoutError::InvalidConfig("timeouts must be greater than 0".into()));
        }

        for url in [
            &self.rates.primary_url,
            &self.rates.fallback_url,
            &self.notifications.endpoint,
        ] {
            let parsed = Url::parse(url)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CheckoutError::InvalidUrl(format!(
                    "URL must start with http:// or https://, got: {}",
                    url
                )));
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `SHOPFRONT_*` overrides from any key lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(code) = lookup("SHOPFRONT_CANONICAL_CURRENCY") {
            match code.parse() {
                Ok(currency) => self.store.canonical_currency = currency,
                Err(_) => warn!(code = %code, "Unknown canonical currency in environment"),
            }
        }

        if let Some(bps) = lookup("SHOPFRONT_TAX_RATE_BPS") {
            if let Ok(bps) = bps.parse::<u32>() {
                self.store.tax_rate_bps = bps;
            }
        }

        if let Some(key) = lookup("SHOPFRONT_CART_KEY") {
            self.store.cart_key = key;
        }

        if let Some(key) = lookup("SHOPFRONT_EXCHANGE_API_KEY") {
            debug!("Using exchange API key from environment");
            self.rates.primary_api_key = Some(key);
        }

        if let Some(url) = lookup("SHOPFRONT_RATES_FALLBACK_URL") {
            debug!(url = %url, "Overriding fallback rates URL from environment");
            self.rates.fallback_url = url;
        }

        if let Some(id) = lookup("SHOPFRONT_EMAILJS_SERVICE_ID") {
            self.notifications.service_id = id;
        }

        if let Some(id) = lookup("SHOPFRONT_EMAILJS_TEMPLATE_ID") {
            self.notifications.template_id = id;
        }

        if let Some(key) = lookup("SHOPFRONT_EMAILJS_PUBLIC_KEY") {
            self.notifications.public_key = key;
        }

        if let Some(path) = lookup("SHOPFRONT_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopfront", "shopfront")
            .map(|dirs| dirs.config_dir().join("shopfront.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Explicit database path, else `shopfront.db` in the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "shopfront", "shopfront")
                .map(|dirs| dirs.data_dir().join("shopfront.db"))
        })
    }

    pub fn canonical_currency(&self) -> CurrencyCode {
        self.store.canonical_currency
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.store.tax_rate_bps)
    }

    pub fn shipping_rules(&self) -> ShippingRules {
        ShippingRules {
            domestic_country: self.shipping.domestic_country.clone(),
            local_regions: self.shipping.local_regions.clone(),
            domestic_rate: Money::from_cents(self.shipping.domestic_rate_cents),
            international_rate: Money::from_cents(self.shipping.international_rate_cents),
        }
    }

    pub fn rate_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.rates.ttl_hours)
    }

    pub fn rate_timeout(&self) -> Duration {
        Duration::from_secs(self.rates.timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.checkout.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = ShopfrontConfig::default();
        assert_eq!(config.canonical_currency(), CurrencyCode::Cad);
        assert_eq!(config.tax_rate().bps(), 200);
        assert_eq!(config.rate_ttl(), chrono::Duration::hours(12));
        assert_eq!(config.shipping_rules(), ShippingRules::default());
        assert_eq!(config.call_timeout(), Duration::from_secs(10));
        assert!(config.rates.primary_api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ShopfrontConfig = toml::from_str(
            r#"
            [shipping]
            domestic_country = "US"
            local_regions = ["NY"]

            [store]
            canonical_currency = "USD"
            "#,
        )
        .unwrap();

        assert_eq!(config.canonical_currency(), CurrencyCode::Usd);
        assert_eq!(config.shipping.domestic_country, "US");
        assert_eq!(config.shipping.domestic_rate_cents, 1_500);
        assert_eq!(config.store.tax_rate_bps, 200);
    }

    #[test]
    fn test_validation() {
        let mut config = ShopfrontConfig::default();
        config.store.tax_rate_bps = 10_001;
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = ShopfrontConfig::default();
        config.rates.fallback_url = "ftp://rates".into();
        assert!(config.validate().is_err());

        let mut config = ShopfrontConfig::default();
        config.shipping.domestic_country = "CAN".into();
        assert!(config.validate().is_err());

        let mut config = ShopfrontConfig::default();
        config.rates.ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SHOPFRONT_EXCHANGE_API_KEY", "secret"),
            ("SHOPFRONT_TAX_RATE_BPS", "1300"),
            ("SHOPFRONT_CANONICAL_CURRENCY", "nope"),
            ("SHOPFRONT_DATABASE_PATH", "/tmp/shop.db"),
        ]
        .into_iter()
        .collect();

        let mut config = ShopfrontConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.rates.primary_api_key.as_deref(), Some("secret"));
        assert_eq!(config.store.tax_rate_bps, 1_300);
        // Unknown codes are ignored
        assert_eq!(config.canonical_currency(), CurrencyCode::Cad);
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/shop.db")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shopfront.toml");

        let mut config = ShopfrontConfig::default();
        config.shipping.local_regions = vec!["ON".into(), "QC".into()];
        config.notifications.service_id = "service_1".into();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[shipping]"));
        assert!(contents.contains("[rates]"));

        let loaded: ShopfrontConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.shipping.local_regions, vec!["ON", "QC"]);
        assert_eq!(loaded.notifications.service_id, "service_1");
    }

    #[test]
    fn test_notifications_need_all_ids() {
        let mut settings = NotificationSettings::default();
        assert!(!settings.is_configured());
        settings.service_id = "s".into();
        settings.template_id = "t".into();
        settings.public_key = "k".into();
        assert!(settings.is_configured());
    }
}
