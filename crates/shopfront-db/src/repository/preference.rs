//! # Preference Repository
//!
//! Plain key/value settings that outlive a session. No expiry.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;
use shopfront_core::CurrencyCode;

/// Key the selected display currency is stored under.
pub const DISPLAY_CURRENCY_KEY: &str = "display_currency";

#[derive(Debug, Clone)]
pub struct PreferenceRepository {
    pool: SqlitePool,
}

impl PreferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PreferenceRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Raw stored code; callers decide how to treat unknown values.
    pub async fn display_currency(&self) -> DbResult<Option<String>> {
        self.get(DISPLAY_CURRENCY_KEY).await
    }

    pub async fn set_display_currency(&self, currency: CurrencyCode) -> DbResult<()> {
        self.set(DISPLAY_CURRENCY_KEY, currency.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_get_set_overwrite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let prefs = db.preferences();

        assert_eq!(prefs.get("theme").await.unwrap(), None);
        prefs.set("theme", "dark").await.unwrap();
        prefs.set("theme", "light").await.unwrap();
        assert_eq!(prefs.get("theme").await.unwrap().as_deref(), Some("light"));
    }

    #[tokio::test]
    async fn test_display_currency() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let prefs = db.preferences();

        assert_eq!(prefs.display_currency().await.unwrap(), None);
        prefs.set_display_currency(CurrencyCode::Eur).await.unwrap();
        assert_eq!(prefs.display_currency().await.unwrap().as_deref(), Some("EUR"));
    }
}
