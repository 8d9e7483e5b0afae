//! # Rate Cache
//!
//! Memoizes exchange rates per currency pair for a fixed TTL.
//!
//! ## Lookup Order
//! ```text
//! get_rate(from, to)
//!   │
//!   ├── from == to ─────────────────────────────► 1        (Identity, no I/O)
//!   ├── cached entry younger than TTL ──────────► cached   (Cached)
//!   ├── primary provider ok ──► store ──────────► rate     (Primary)
//!   ├── fallback provider ok ─► store ──────────► rate     (Fallback)
//!   ├── any cached entry, however old ──────────► cached   (Stale, warn)
//!   └── nothing at all ─────────────────────────► 1        (Identity, warn)
//! ```
//!
//! A stale rate is still a real rate, only old. The last-resort identity
//! rate is not: [`RateQuote::is_authoritative`] is false for it and callers
//! must not treat it as a conversion.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::services::{Clock, RateProvider};
use shopfront_core::{CurrencyCode, RateCacheEntry, RateSource};
use shopfront_db::RateCacheRepository;

/// A rate together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuote {
    pub rate: Decimal,
    pub source: RateSource,
}

impl RateQuote {
    fn identity() -> Self {
        RateQuote {
            rate: Decimal::ONE,
            source: RateSource::Identity,
        }
    }

    /// False only for the last-resort identity rate between two
    /// different currencies.
    pub fn is_authoritative(&self, from: CurrencyCode, to: CurrencyCode) -> bool {
        self.source != RateSource::Identity || from == to
    }
}

pub struct RateCache {
    repo: RateCacheRepository,
    primary: Arc<dyn RateProvider>,
    fallback: Arc<dyn RateProvider>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    timeout: Duration,
}

impl RateCache {
    pub fn new(
        repo: RateCacheRepository,
        primary: Arc<dyn RateProvider>,
        fallback: Arc<dyn RateProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        RateCache {
            repo,
            primary,
            fallback,
            clock,
            ttl: chrono::Duration::hours(shopfront_core::RATE_TTL_HOURS),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Per-provider call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Never fails; see the module docs for the degraded answers.
    pub async fn get_rate(&self, from: CurrencyCode, to: CurrencyCode) -> RateQuote {
        if from == to {
            return RateQuote::identity();
        }

        let cached = match self.repo.get(from, to).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%from, %to, error = %e, "Rate cache read failed, treating as miss");
                None
            }
        };

        let now = self.clock.now();
        if let Some(entry) = &cached {
            if entry.is_fresh(now, self.ttl) {
                debug!(%from, %to, rate = %entry.rate, "Rate cache hit");
                return RateQuote {
                    rate: entry.rate,
                    source: RateSource::Cached,
                };
            }
        }

        for (provider, source) in [
            (&self.primary, RateSource::Primary),
            (&self.fallback, RateSource::Fallback),
        ] {
            match self.fetch(provider.as_ref(), from, to).await {
                Ok(rate) => {
                    self.store(from, to, rate, source).await;
                    return RateQuote { rate, source };
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        %from,
                        %to,
                        error = %e,
                        "Rate provider failed"
                    );
                }
            }
        }

        match cached {
            Some(entry) => {
                warn!(
                    %from,
                    %to,
                    rate = %entry.rate,
                    fetched_at = %entry.fetched_at,
                    "stale rate used"
                );
                RateQuote {
                    rate: entry.rate,
                    source: RateSource::Stale,
                }
            }
            None => {
                warn!(%from, %to, "No rate available, using identity rate");
                RateQuote::identity()
            }
        }
    }

    async fn fetch(
        &self,
        provider: &dyn RateProvider,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Decimal, ServiceError> {
        let rate = tokio::time::timeout(self.timeout, provider.get_rate(from, to))
            .await
            .map_err(|_| ServiceError::Timeout {
                service: provider.name().to_string(),
                seconds: self.timeout.as_secs(),
            })??;

        if rate <= Decimal::ZERO {
            return Err(ServiceError::invalid(
                provider.name(),
                format!("non-positive rate {rate}"),
            ));
        }
        Ok(rate)
    }

    async fn store(&self, from: CurrencyCode, to: CurrencyCode, rate: Decimal, source: RateSource) {
        let entry = RateCacheEntry {
            from,
            to,
            rate,
            source,
            fetched_at: self.clock.now(),
        };

        match self.repo.put(&entry).await {
            Ok(()) => info!(%from, %to, %rate, source = source.as_str(), "Rate cached"),
            Err(e) => warn!(%from, %to, error = %e, "Failed to cache rate"),
        }
    }
}
