//! Shared error types for the services crate.

use thiserror::Error;

use quote_core::model::AnalysisId;
use storage::repository::StorageError;

/// Errors emitted by the OCR/AI analysis client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalysisClientError {
    #[error("analysis service is not configured")]
    Disabled,

    #[error("analysis request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("analysis response could not be decoded: {0}")]
    Decode(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the sheet aggregate and `SheetService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SheetError {
    #[error("no pricing row for analysis {0}")]
    RowNotFound(AnalysisId),

    #[error("analysis {0} was not inserted manually and cannot be deleted")]
    NotManualEntry(AnalysisId),

    #[error("row {analysis_id} has no sub-document at index {index}")]
    DocumentIndexOutOfRange { analysis_id: AnalysisId, index: u32 },

    #[error("sheet has unsaved changes")]
    UnsavedChanges,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Analysis(#[from] AnalysisClientError),
}
