use chrono::{DateTime, Utc};
use quote_core::model::{
    AnalysisId, AnalysisResult, BatchId, CertificationType, CertificationTypeId, Complexity,
    EntryMethod, FileId, Money, Multiplier, PageTenths, PricingSnapshot, ProcessingStatus,
    SnapshotCertification, SubDocument,
};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn uuid_from_text(field: &'static str, raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

pub(crate) fn parse_processing_status(s: &str) -> Result<ProcessingStatus, StorageError> {
    match s {
        "completed" => Ok(ProcessingStatus::Completed),
        "failed" => Ok(ProcessingStatus::Failed),
        "manual" => Ok(ProcessingStatus::Manual),
        _ => Err(StorageError::Serialization(format!(
            "invalid processing_status: {s}"
        ))),
    }
}

pub(crate) fn parse_entry_method(s: &str) -> Result<EntryMethod, StorageError> {
    match s {
        "ocr" => Ok(EntryMethod::Ocr),
        "manual" => Ok(EntryMethod::Manual),
        "ai_failed" => Ok(EntryMethod::AiFailed),
        _ => Err(StorageError::Serialization(format!(
            "invalid entry_method: {s}"
        ))),
    }
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Reads the flattened `pricing_*` columns back into a snapshot.
///
/// `pricing_saved_at IS NULL` means no snapshot. Individually missing or
/// malformed snapshot fields default rather than error: a corrupt snapshot
/// degrades to a visible zero-cost row instead of sinking the batch.
fn map_pricing_snapshot(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Option<PricingSnapshot>, StorageError> {
    let saved_at: Option<DateTime<Utc>> = row.try_get("pricing_saved_at").map_err(ser)?;
    let Some(saved_at) = saved_at else {
        return Ok(None);
    };

    let billable_pages = row
        .try_get::<Option<i64>, _>("pricing_billable_page_tenths")
        .map_err(ser)?
        .and_then(|v| u32::try_from(v).ok())
        .map_or(PageTenths::ZERO, PageTenths::new);

    let complexity = row
        .try_get::<Option<String>, _>("pricing_complexity")
        .map_err(ser)?
        .map_or(Complexity::Medium, |s| Complexity::parse_lossy(&s));

    let complexity_multiplier = row
        .try_get::<Option<i64>, _>("pricing_complexity_multiplier")
        .map_err(ser)?
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .map_or(Multiplier::ONE, Multiplier::from_hundredths);

    let base_rate = row
        .try_get::<Option<i64>, _>("pricing_base_rate_cents")
        .map_err(ser)?
        .map_or(Money::ZERO, Money::from_cents)
        .clamp_non_negative();

    let certification_type_id = row
        .try_get::<Option<String>, _>("pricing_certification_type_id")
        .map_err(ser)?
        .and_then(|s| Uuid::parse_str(&s).ok())
        .map(CertificationTypeId::new);

    let document_certifications: Option<Vec<SnapshotCertification>> = row
        .try_get::<Option<String>, _>("pricing_document_certifications")
        .map_err(ser)?
        .and_then(|json| serde_json::from_str(&json).ok());

    Ok(Some(PricingSnapshot {
        billable_pages,
        complexity,
        complexity_multiplier,
        base_rate,
        certification_type_id,
        is_excluded: row
            .try_get::<Option<bool>, _>("pricing_is_excluded")
            .map_err(ser)?
            .unwrap_or(false),
        is_billable_overridden: row
            .try_get::<Option<bool>, _>("pricing_is_billable_overridden")
            .map_err(ser)?
            .unwrap_or(false),
        document_certifications,
        saved_at,
    }))
}

pub(crate) fn map_analysis_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AnalysisResult, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let batch_id: String = row.try_get("batch_id").map_err(ser)?;
    let file_id: String = row.try_get("file_id").map_err(ser)?;

    // A malformed sub-document list degrades to "no detected sub-documents";
    // the row builder re-derives entries from document_count.
    let sub_documents: Vec<SubDocument> = row
        .try_get::<String, _>("sub_documents")
        .map_err(ser)
        .map(|json| serde_json::from_str(&json).unwrap_or_default())?;

    let status: String = row.try_get("processing_status").map_err(ser)?;
    let entry: String = row.try_get("entry_method").map_err(ser)?;
    let complexity: String = row.try_get("complexity").map_err(ser)?;

    Ok(AnalysisResult {
        id: AnalysisId::new(uuid_from_text("id", &id)?),
        batch_id: BatchId::new(uuid_from_text("batch_id", &batch_id)?),
        file_id: FileId::new(uuid_from_text("file_id", &file_id)?),
        file_name: row.try_get("file_name").map_err(ser)?,
        word_count: u32_from_i64("word_count", row.try_get("word_count").map_err(ser)?)?,
        page_count: u32_from_i64("page_count", row.try_get("page_count").map_err(ser)?)?,
        document_type: row.try_get("document_type").map_err(ser)?,
        complexity: Complexity::parse_lossy(&complexity),
        document_count: u32_from_i64(
            "document_count",
            row.try_get("document_count").map_err(ser)?,
        )?,
        sub_documents,
        processing_status: parse_processing_status(&status)?,
        entry_method: parse_entry_method(&entry)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        pricing: map_pricing_snapshot(row)?,
    })
}

pub(crate) fn map_certification_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CertificationType, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    Ok(CertificationType {
        id: CertificationTypeId::new(uuid_from_text("certification_type_id", &id)?),
        name: row.try_get("name").map_err(ser)?,
        code: row.try_get("code").map_err(ser)?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents").map_err(ser)?)
            .clamp_non_negative(),
        active: row.try_get("active").map_err(ser)?,
        sort_order: i32::try_from(row.try_get::<i64, _>("sort_order").map_err(ser)?)
            .unwrap_or(i32::MAX),
    })
}

pub(crate) fn certifications_to_json(
    certifications: Option<&[SnapshotCertification]>,
) -> Result<Option<String>, StorageError> {
    certifications
        .map(|entries| serde_json::to_string(entries).map_err(ser))
        .transpose()
}

pub(crate) fn sub_documents_to_json(sub_documents: &[SubDocument]) -> Result<String, StorageError> {
    serde_json::to_string(sub_documents).map_err(ser)
}
