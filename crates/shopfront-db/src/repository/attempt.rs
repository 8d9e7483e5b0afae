//! # Checkout Attempt Repository
//!
//! Persists the orchestrator's current attempt so a retry after a restart
//! still reuses the settled intent and skips decremented stock keys.
//!
//! The attempt itself is stored as JSON; `stage`, `intent_id` and
//! `completed_at` are copied into columns for inspection and lookup.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;
use shopfront_core::CheckoutAttempt;

#[derive(Debug, Clone)]
pub struct CheckoutAttemptRepository {
    pool: SqlitePool,
}

impl CheckoutAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutAttemptRepository { pool }
    }

    /// Inserts or replaces the attempt. A complete attempt gets `completed_at`.
    pub async fn save(&self, attempt: &CheckoutAttempt) -> DbResult<()> {
        let payload = serde_json::to_string(attempt)?;
        let completed_at = (!attempt.is_open()).then_some(attempt.updated_at);

        debug!(
            attempt_id = %attempt.attempt_id,
            stage = %attempt.stage,
            "Saving checkout attempt"
        );

        sqlx::query(
            r#"
            INSERT INTO checkout_attempts (
                id, intent_id, stage, payload, created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (id) DO UPDATE SET
                intent_id = excluded.intent_id,
                stage = excluded.stage,
                payload = excluded.payload,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&attempt.attempt_id)
        .bind(&attempt.intent_id)
        .bind(attempt.stage.to_string())
        .bind(payload)
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, attempt_id: &str) -> DbResult<Option<CheckoutAttempt>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM checkout_attempts WHERE id = ?1")
                .bind(attempt_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(payload.and_then(|p| decode(attempt_id, &p)))
    }

    /// The most recently touched attempt that has not completed.
    pub async fn load_open(&self) -> DbResult<Option<CheckoutAttempt>> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, payload FROM checkout_attempts
            WHERE completed_at IS NULL
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(id, payload)| decode(&id, &payload)))
    }

    /// Marks an attempt closed without completing it, so `load_open` skips
    /// it. `get` still returns it.
    pub async fn close(&self, attempt_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE checkout_attempts SET completed_at = ?2 WHERE id = ?1")
            .bind(attempt_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode(attempt_id: &str, payload: &str) -> Option<CheckoutAttempt> {
    match serde_json::from_str(payload) {
        Ok(attempt) => Some(attempt),
        Err(e) => {
            warn!(attempt_id = %attempt_id, error = %e, "Ignoring unreadable checkout attempt");
            None
        }
    }
}
