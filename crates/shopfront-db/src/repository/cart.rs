//! # Cart Snapshot Repository
//!
//! The full line list of a local cart, stored as one JSON document per
//! cart key and rewritten after every mutation.
//!
//! An unreadable snapshot loads as an empty cart. Rehydration against
//! live stock happens in the cart store, not here.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;
use shopfront_core::CartLine;

#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Replaces the snapshot for `cart_key` with `lines`.
    pub async fn save(&self, cart_key: &str, lines: &[CartLine]) -> DbResult<()> {
        let payload = serde_json::to_string(lines)?;

        debug!(cart_key = %cart_key, lines = lines.len(), "Saving cart snapshot");

        sqlx::query(
            r#"
            INSERT INTO cart_snapshots (cart_key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (cart_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(cart_key)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads the persisted lines, exactly as saved.
    ///
    /// Returns an empty list when there is no snapshot or it cannot be parsed.
    pub async fn load_lines(&self, cart_key: &str) -> DbResult<Vec<CartLine>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM cart_snapshots WHERE cart_key = ?1")
                .bind(cart_key)
                .fetch_optional(&self.pool)
                .await?;

        let Some(payload) = payload else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<CartLine>>(&payload) {
            Ok(lines) => Ok(lines),
            Err(e) => {
                warn!(cart_key = %cart_key, error = %e, "Discarding unreadable cart snapshot");
                Ok(Vec::new())
            }
        }
    }

    /// Removes the snapshot entirely.
    pub async fn clear(&self, cart_key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM cart_snapshots WHERE cart_key = ?1")
            .bind(cart_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
