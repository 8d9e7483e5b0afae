//! Display-currency preference with change notification.

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::CheckoutResult;
use shopfront_core::CurrencyCode;
use shopfront_db::PreferenceRepository;

/// The shopper's chosen display currency.
///
/// Unknown or missing stored codes read as the canonical currency.
pub struct DisplayCurrencyStore {
    repo: PreferenceRepository,
    tx: watch::Sender<CurrencyCode>,
}

impl DisplayCurrencyStore {
    pub async fn load(repo: PreferenceRepository, canonical: CurrencyCode) -> Self {
        let current = match repo.display_currency().await {
            Ok(Some(code)) => code.parse().unwrap_or_else(|_| {
                warn!(code = %code, "Stored display currency is not supported, using canonical");
                canonical
            }),
            Ok(None) => canonical,
            Err(e) => {
                warn!(error = %e, "Failed to read display currency, using canonical");
                canonical
            }
        };

        let (tx, _rx) = watch::channel(current);
        DisplayCurrencyStore { repo, tx }
    }

    pub fn get(&self) -> CurrencyCode {
        *self.tx.borrow()
    }

    /// Switches the display currency. The in-memory value changes even if
    /// persisting it fails.
    pub async fn set(&self, currency: CurrencyCode) {
        let previous = self.tx.send_replace(currency);
        if previous != currency {
            info!(from = %previous, to = %currency, "Display currency changed");
        }

        if let Err(e) = self.repo.set_display_currency(currency).await {
            warn!(%currency, error = %e, "Failed to persist display currency");
        }
    }

    /// Parses and sets a code from user input.
    pub async fn set_code(&self, code: &str) -> CheckoutResult<CurrencyCode> {
        let currency: CurrencyCode = code.parse()?;
        self.set(currency).await;
        Ok(currency)
    }

    pub fn subscribe(&self) -> watch::Receiver<CurrencyCode> {
        self.tx.subscribe()
    }
}
