//! # Exchange Rate Cache Repository
//!
//! One row per `(from, to)` pair. Writes are upserts, so the latest fetch
//! always replaces the previous one. Freshness is the caller's decision;
//! expired rows are kept because a stale rate beats no rate.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;
use shopfront_core::{CurrencyCode, RateCacheEntry, RateSource};

#[derive(Debug, Clone)]
pub struct RateCacheRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct RateRow {
    from_currency: String,
    to_currency: String,
    rate: String,
    source: String,
    fetched_at: DateTime<Utc>,
}

impl RateRow {
    /// `None` for rows written by an older build or edited by hand.
    fn into_entry(self) -> Option<RateCacheEntry> {
        let entry = RateCacheEntry {
            from: CurrencyCode::from_str(&self.from_currency).ok()?,
            to: CurrencyCode::from_str(&self.to_currency).ok()?,
            rate: Decimal::from_str(&self.rate).ok()?,
            source: RateSource::parse(&self.source)?,
            fetched_at: self.fetched_at,
        };
        (entry.rate > Decimal::ZERO).then_some(entry)
    }
}

impl RateCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RateCacheRepository { pool }
    }

    /// Returns the stored entry for a pair, fresh or not.
    pub async fn get(&self, from: CurrencyCode, to: CurrencyCode) -> DbResult<Option<RateCacheEntry>> {
        let row = sqlx::query_as::<_, RateRow>(
            r#"
            SELECT from_currency, to_currency, rate, source, fetched_at
            FROM exchange_rates
            WHERE from_currency = ?1 AND to_currency = ?2
            "#,
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let entry = row.into_entry();
            if entry.is_none() {
                warn!(%from, %to, "Ignoring unreadable cached rate");
            }
            entry
        }))
    }

    /// Stores an entry, replacing any previous one for the pair.
    pub async fn put(&self, entry: &RateCacheEntry) -> DbResult<()> {
        debug!(
            from = %entry.from,
            to = %entry.to,
            rate = %entry.rate,
            source = entry.source.as_str(),
            "Caching exchange rate"
        );

        sqlx::query(
            r#"
            INSERT INTO exchange_rates (from_currency, to_currency, rate, source, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (from_currency, to_currency) DO UPDATE SET
                rate = excluded.rate,
                source = excluded.source,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(entry.from.as_str())
        .bind(entry.to.as_str())
        .bind(entry.rate.to_string())
        .bind(entry.source.as_str())
        .bind(entry.fetched_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every readable entry, newest first.
    pub async fn list(&self) -> DbResult<Vec<RateCacheEntry>> {
        let rows = sqlx::query_as::<_, RateRow>(
            r#"
            SELECT from_currency, to_currency, rate, source, fetched_at
            FROM exchange_rates
            ORDER BY fetched_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(RateRow::into_entry).collect())
    }
}
