mod analysis;
mod certification;
mod ids;
mod job;
mod money;
mod row;
mod settings;

pub use analysis::{
    AnalysisResult, Complexity, EntryMethod, PageDetail, PageSummary, PricingSnapshot,
    ProcessingStatus, SnapshotCertification, SubDocument,
};
pub use certification::{CertificationType, NOTARIZATION_CODE, default_certification};
pub use ids::{AnalysisId, BatchId, CertificationTypeId, FileId, JobId};
pub use job::{AnalysisJob, JobStatus};
pub use money::{Money, Multiplier, PageTenths, RATE_STEP};
pub use row::{DocumentCertification, PricingRow};
pub use settings::{BillingSettings, SettingsError};
