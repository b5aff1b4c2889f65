use serde::{Deserialize, Serialize};

use crate::model::ids::{BatchId, JobId};

/// Lifecycle of an asynchronous analysis job.
///
/// `Queued → Processing → {Completed | Partial | Failed}`. Synchronous
/// single-shot submissions may jump straight to a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    /// Terminal states stop the monitor's polling.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Partial | JobStatus::Failed
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }
}

/// Progress of one OCR/AI analysis submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: JobId,
    pub batch_id: BatchId,
    pub status: JobStatus,
    pub total_files: u32,
    pub completed_files: u32,
    pub failed_files: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Partial.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
