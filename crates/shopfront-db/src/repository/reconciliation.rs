//! # Reconciliation Queue Repository
//!
//! Follow-ups left behind when money has moved but the order could not be
//! finished cleanly.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Orchestrator: stock decrement fails after payment settled              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue(StockUnreconciled, attempt_id, payload)                        │
//! │       │   (an open entry for the same attempt and kind is updated       │
//! │       │    instead of duplicated)                                       │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────────┐                                       │
//! │  │ user retry fails again       │──► record_failure(id, error)          │
//! │  │ user retry succeeds          │──► resolve_for_attempt(...)           │
//! │  │ operator fixes it by hand    │──► mark_resolved(id, note)            │
//! │  └──────────────────────────────┘                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cleanup_resolved(days)  ← Housekeeping                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::error::DbResult;
use shopfront_core::{ReconciliationEntry, ReconciliationKind};

#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    kind: ReconciliationKind,
    attempt_id: String,
    intent_id: Option<String>,
    payload: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for ReconciliationEntry {
    fn from(row: EntryRow) -> Self {
        ReconciliationEntry {
            id: row.id,
            kind: row.kind,
            attempt_id: row.attempt_id,
            intent_id: row.intent_id,
            payload: row.payload,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
        }
    }
}

impl ReconciliationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReconciliationRepository { pool }
    }

    /// Queues a follow-up, or refreshes the open one for the same attempt
    /// and kind. Returns the entry id.
    pub async fn enqueue(
        &self,
        kind: ReconciliationKind,
        attempt_id: &str,
        intent_id: Option<&str>,
        payload: &str,
        last_error: &str,
    ) -> DbResult<i64> {
        let existing: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM reconciliation_queue
            WHERE attempt_id = ?1 AND kind = ?2 AND resolved_at IS NULL
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(attempt_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = existing {
            sqlx::query(
                r#"
                UPDATE reconciliation_queue SET
                    payload = ?2,
                    attempts = attempts + 1,
                    last_error = ?3
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .bind(payload)
            .bind(last_error)
            .execute(&self.pool)
            .await?;

            debug!(id, attempt_id = %attempt_id, ?kind, "Refreshed open follow-up");
            return Ok(id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO reconciliation_queue (
                kind, attempt_id, intent_id, payload, attempts, last_error, created_at
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
            "#,
        )
        .bind(kind)
        .bind(attempt_id)
        .bind(intent_id)
        .bind(payload)
        .bind(last_error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        error!(
            id,
            attempt_id = %attempt_id,
            intent_id = intent_id.unwrap_or("-"),
            ?kind,
            "Queued for manual reconciliation"
        );
        Ok(id)
    }

    /// Unresolved entries, oldest first.
    pub async fn get_open(&self, limit: u32) -> DbResult<Vec<ReconciliationEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, kind, attempt_id, intent_id, payload, attempts, last_error, created_at
            FROM reconciliation_queue
            WHERE resolved_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReconciliationEntry::from).collect())
    }

    pub async fn count_open(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reconciliation_queue WHERE resolved_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn mark_resolved(&self, id: i64, note: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE reconciliation_queue SET
                resolved_at = ?2,
                resolution_note = ?3
            WHERE id = ?1 AND resolved_at IS NULL
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .bind(note)
        .execute(&self.pool)
        .await?;

        info!(id, note = %note, "Follow-up resolved");
        Ok(())
    }

    /// Resolves every open entry of `kind` for an attempt. Returns how many.
    pub async fn resolve_for_attempt(
        &self,
        attempt_id: &str,
        kind: ReconciliationKind,
        note: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_queue SET
                resolved_at = ?3,
                resolution_note = ?4
            WHERE attempt_id = ?1 AND kind = ?2 AND resolved_at IS NULL
            "#,
        )
        .bind(attempt_id)
        .bind(kind)
        .bind(Utc::now())
        .bind(note)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn record_failure(&self, id: i64, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE reconciliation_queue SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes entries resolved more than `days_old` days ago.
    pub async fn cleanup_resolved(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));
        let result = sqlx::query(
            r#"
            DELETE FROM reconciliation_queue
            WHERE resolved_at IS NOT NULL
            AND resolved_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
