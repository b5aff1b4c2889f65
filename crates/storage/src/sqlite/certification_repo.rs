use quote_core::model::CertificationType;

use super::{SqliteRepository, mapping::map_certification_row};
use crate::repository::{CertificationTypeRepository, StorageError};

#[async_trait::async_trait]
impl CertificationTypeRepository for SqliteRepository {
    async fn list_active(&self) -> Result<Vec<CertificationType>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, code, unit_price_cents, active, sort_order
            FROM certification_types
            WHERE active = 1
            ORDER BY sort_order ASC, name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut types = Vec::with_capacity(rows.len());
        for row in rows {
            types.push(map_certification_row(&row)?);
        }
        Ok(types)
    }
}
