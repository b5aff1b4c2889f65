use chrono::{DateTime, Utc};
use quote_core::model::{AnalysisId, AnalysisResult, BatchId, PricingSnapshot};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{certifications_to_json, map_analysis_row, ser, sub_documents_to_json},
};
use crate::repository::{AnalysisRepository, StorageError};

const ANALYSIS_COLUMNS: &str = r"
    id, batch_id, file_id, file_name, word_count, page_count, document_type,
    complexity, document_count, sub_documents, processing_status, entry_method,
    created_at, pricing_billable_page_tenths, pricing_complexity,
    pricing_complexity_multiplier, pricing_base_rate_cents,
    pricing_certification_type_id, pricing_is_excluded,
    pricing_is_billable_overridden, pricing_document_certifications,
    pricing_saved_at
";

#[async_trait::async_trait]
impl AnalysisRepository for SqliteRepository {
    async fn list_for_batch(&self, batch_id: BatchId) -> Result<Vec<AnalysisResult>, StorageError> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analysis_results
             WHERE batch_id = ?1
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(batch_id.value().to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(map_analysis_row(&row)?);
        }
        Ok(results)
    }

    async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, StorageError> {
        let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM analysis_results WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.value().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;
        map_analysis_row(&row)
    }

    async fn insert(&self, result: &AnalysisResult) -> Result<(), StorageError> {
        let pricing = result.pricing.as_ref();
        let outcome = sqlx::query(
            r"
            INSERT OR IGNORE INTO analysis_results (
                id, batch_id, file_id, file_name, word_count, page_count,
                document_type, complexity, document_count, sub_documents,
                processing_status, entry_method, created_at,
                pricing_billable_page_tenths, pricing_complexity,
                pricing_complexity_multiplier, pricing_base_rate_cents,
                pricing_certification_type_id, pricing_is_excluded,
                pricing_is_billable_overridden, pricing_document_certifications,
                pricing_saved_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            ",
        )
        .bind(result.id.value().to_string())
        .bind(result.batch_id.value().to_string())
        .bind(result.file_id.value().to_string())
        .bind(result.file_name.clone())
        .bind(i64::from(result.word_count))
        .bind(i64::from(result.page_count))
        .bind(result.document_type.clone())
        .bind(result.complexity.as_str())
        .bind(i64::from(result.document_count))
        .bind(sub_documents_to_json(&result.sub_documents)?)
        .bind(result.processing_status.as_str())
        .bind(result.entry_method.as_str())
        .bind(result.created_at)
        .bind(pricing.map(|p| i64::from(p.billable_pages.tenths())))
        .bind(pricing.map(|p| p.complexity.as_str()))
        .bind(pricing.map(|p| i64::from(p.complexity_multiplier.hundredths())))
        .bind(pricing.map(|p| p.base_rate.cents()))
        .bind(pricing.and_then(|p| p.certification_type_id.map(|c| c.value().to_string())))
        .bind(pricing.map(|p| p.is_excluded))
        .bind(pricing.map(|p| p.is_billable_overridden))
        .bind(
            pricing
                .map(|p| certifications_to_json(p.document_certifications.as_deref()))
                .transpose()?
                .flatten(),
        )
        .bind(pricing.map(|p| p.saved_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn update_pricing(
        &self,
        id: AnalysisId,
        pricing: &PricingSnapshot,
    ) -> Result<(), StorageError> {
        let outcome = sqlx::query(
            r"
            UPDATE analysis_results SET
                pricing_billable_page_tenths = ?2,
                pricing_complexity = ?3,
                pricing_complexity_multiplier = ?4,
                pricing_base_rate_cents = ?5,
                pricing_certification_type_id = ?6,
                pricing_is_excluded = ?7,
                pricing_is_billable_overridden = ?8,
                pricing_document_certifications = ?9,
                pricing_saved_at = ?10
            WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .bind(i64::from(pricing.billable_pages.tenths()))
        .bind(pricing.complexity.as_str())
        .bind(i64::from(pricing.complexity_multiplier.hundredths()))
        .bind(pricing.base_rate.cents())
        .bind(pricing.certification_type_id.map(|c| c.value().to_string()))
        .bind(pricing.is_excluded)
        .bind(pricing.is_billable_overridden)
        .bind(certifications_to_json(pricing.document_certifications.as_deref())?)
        .bind(pricing.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn current_saved_at(
        &self,
        id: AnalysisId,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row = sqlx::query("SELECT pricing_saved_at FROM analysis_results WHERE id = ?1")
            .bind(id.value().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;
        row.try_get("pricing_saved_at").map_err(ser)
    }

    async fn delete(&self, id: AnalysisId) -> Result<(), StorageError> {
        let outcome = sqlx::query("DELETE FROM analysis_results WHERE id = ?1")
            .bind(id.value().to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
