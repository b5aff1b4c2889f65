use sqlx::Row;

use super::{SqliteRepository, mapping::ser};
use crate::repository::{SettingsRepository, StorageError};

#[async_trait::async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM app_settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        row.map(|r| r.try_get("value").map_err(ser)).transpose()
    }

    async fn list_prefixed(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        // LIKE with an escaped prefix; settings keys are snake_case so the
        // only wildcard characters to worry about are literal underscores.
        let pattern = format!(
            "{}%",
            prefix.replace('\\', r"\\").replace('%', r"\%").replace('_', r"\_")
        );
        let rows = sqlx::query(
            r"
            SELECT key, value FROM app_settings
            WHERE key LIKE ?1 ESCAPE '\'
            ORDER BY key ASC
            ",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push((
                row.try_get("key").map_err(ser)?,
                row.try_get("value").map_err(ser)?,
            ));
        }
        Ok(pairs)
    }
}
