use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{AnalysisId, BatchId, CertificationTypeId, FileId};
use crate::model::money::{Money, Multiplier, PageTenths};

//
// ─── CLASSIFICATION ────────────────────────────────────────────────────────────
//

/// AI-assessed translation complexity tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Easy,
    Medium,
    Hard,
}

impl Complexity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Easy => "easy",
            Complexity::Medium => "medium",
            Complexity::Hard => "hard",
        }
    }

    /// Parses the storage/wire representation. Unknown tiers map to
    /// `Medium` so one malformed record cannot sink a whole batch.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "easy" => Complexity::Easy,
            "hard" => Complexity::Hard,
            _ => Complexity::Medium,
        }
    }
}

/// How far the pipeline got with a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Completed,
    Failed,
    Manual,
}

impl ProcessingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Manual => "manual",
        }
    }
}

/// How a document entered the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMethod {
    Ocr,
    Manual,
    AiFailed,
}

impl EntryMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntryMethod::Ocr => "ocr",
            EntryMethod::Manual => "manual",
            EntryMethod::AiFailed => "ai_failed",
        }
    }
}

//
// ─── ANALYSIS RESULT ───────────────────────────────────────────────────────────
//

/// One logical document detected within an uploaded file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDocument {
    pub doc_type: Option<String>,
    pub holder_name: Option<String>,
    pub page_range: Option<String>,
    pub language: Option<String>,
}

/// A per-sub-document certification choice captured at save time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCertification {
    pub index: u32,
    pub certification_type_id: CertificationTypeId,
}

/// The persisted record of a human-finalized pricing decision.
///
/// Distinct from AI-derived defaults: when present, it wins over whatever a
/// fresh analysis would compute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub billable_pages: PageTenths,
    pub complexity: Complexity,
    pub complexity_multiplier: Multiplier,
    pub base_rate: Money,
    pub certification_type_id: Option<CertificationTypeId>,
    pub is_excluded: bool,
    pub is_billable_overridden: bool,
    pub document_certifications: Option<Vec<SnapshotCertification>>,
    pub saved_at: DateTime<Utc>,
}

/// Per-document output of the OCR/AI pipeline, plus any persisted pricing
/// decision. One canonical field set; any external-format adaptation happens
/// at the record-store boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: AnalysisId,
    pub batch_id: BatchId,
    pub file_id: FileId,
    pub file_name: String,
    pub word_count: u32,
    pub page_count: u32,
    pub document_type: Option<String>,
    pub complexity: Complexity,
    pub document_count: u32,
    pub sub_documents: Vec<SubDocument>,
    pub processing_status: ProcessingStatus,
    pub entry_method: EntryMethod,
    pub created_at: DateTime<Utc>,
    pub pricing: Option<PricingSnapshot>,
}

impl AnalysisResult {
    /// Builds a staff-inserted document: zero word count, one page,
    /// a single sub-document, no AI output.
    #[must_use]
    pub fn manual(
        batch_id: BatchId,
        file_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AnalysisId::generate(),
            batch_id,
            file_id: FileId::generate(),
            file_name: file_name.into(),
            word_count: 0,
            page_count: 1,
            document_type: None,
            complexity: Complexity::Easy,
            document_count: 1,
            sub_documents: vec![SubDocument::default()],
            processing_status: ProcessingStatus::Manual,
            entry_method: EntryMethod::Manual,
            created_at,
            pricing: None,
        }
    }

    /// Whether this record belongs on the pricing sheet. Failed rows stay
    /// priceable manually; only rows the pipeline never produced output
    /// for are skipped.
    #[must_use]
    pub fn is_priceable(&self) -> bool {
        matches!(
            self.processing_status,
            ProcessingStatus::Completed | ProcessingStatus::Manual | ProcessingStatus::Failed
        ) || self.entry_method == EntryMethod::Manual
    }
}

//
// ─── PAGE DETAIL ───────────────────────────────────────────────────────────────
//

/// Per-page counts for one file, fetched lazily on demand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDetail {
    pub file_id: FileId,
    pub pages: Vec<PageSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub number: u32,
    pub word_count: u32,
}
