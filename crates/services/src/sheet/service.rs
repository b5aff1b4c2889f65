use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use quote_core::Clock;
use quote_core::model::{
    AnalysisId, AnalysisJob, BatchId, FileId, PageDetail, PricingRow, PricingSnapshot,
    SnapshotCertification,
};
use storage::repository::{Storage, StorageError};

use super::Sheet;
use crate::analysis_client::AnalysisClient;
use crate::error::SheetError;
use crate::settings_service::SettingsService;

//
// ─── SAVE REPORT ───────────────────────────────────────────────────────────────
//

/// One row that could not be persisted.
#[derive(Debug)]
pub struct SaveFailure {
    pub analysis_id: AnalysisId,
    pub error: StorageError,
}

/// Per-row outcome of a save. Operators save dozens of rows in one action;
/// a single failing row must not silently abandon the remainder.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Rows whose snapshot was written.
    pub saved: Vec<AnalysisId>,
    /// Rows whose write failed; the in-memory edits are retained for retry.
    pub failed: Vec<SaveFailure>,
    /// Rows skipped because the store holds a newer snapshot than the one
    /// this sheet was built from (another operator saved in between).
    pub stale: Vec<AnalysisId>,
}

impl SaveReport {
    /// True when every row was persisted and nothing was skipped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.stale.is_empty()
    }
}

//
// ─── SHEET SERVICE ─────────────────────────────────────────────────────────────
//

/// Wraps the in-memory [`Sheet`] with its I/O: loading, saving, page-detail
/// fetches, and re-analysis submission. All edit operations stay on the
/// aggregate via [`SheetService::sheet_mut`].
pub struct SheetService {
    storage: Storage,
    client: Arc<dyn AnalysisClient>,
    clock: Clock,
    sheet: Sheet,
    /// Page details are fetched once per file and cached for the sheet's
    /// lifetime.
    page_details: HashMap<FileId, PageDetail>,
}

impl SheetService {
    /// Load the working sheet for a batch.
    ///
    /// Settings fall back to the default policy and an unreachable
    /// certification catalogue degrades to an empty one; only a failure to
    /// read the batch's analysis results is an error, since there is no
    /// sheet without them.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Storage` if the analysis results cannot be read.
    pub async fn load(
        storage: Storage,
        client: Arc<dyn AnalysisClient>,
        clock: Clock,
        batch_id: BatchId,
    ) -> Result<Self, SheetError> {
        let settings = SettingsService::new(Arc::clone(&storage.settings))
            .load()
            .await;
        let certifications = match storage.certification_types.list_active().await {
            Ok(types) => types,
            Err(err) => {
                tracing::warn!(error = %err, "certification types unavailable, pricing without them");
                Vec::new()
            }
        };
        let results = storage.analyses.list_for_batch(batch_id).await?;

        Ok(Self {
            storage,
            client,
            clock,
            sheet: Sheet::build(batch_id, settings, certifications, results),
            page_details: HashMap::new(),
        })
    }

    #[must_use]
    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    #[must_use]
    pub fn sheet_mut(&mut self) -> &mut Sheet {
        &mut self.sheet
    }

    /// Persist every row's current state back into its analysis result's
    /// pricing snapshot, best-effort per row.
    ///
    /// Rows racing a newer persisted snapshot are reported stale and left
    /// untouched in the store. The sheet's unsaved-changes flag clears only
    /// when every row succeeded.
    pub async fn save(&mut self) -> SaveReport {
        let saved_at = self.clock.now();
        let mut report = SaveReport::default();

        let row_ids: Vec<AnalysisId> =
            self.sheet.rows().iter().map(|r| r.analysis_id).collect();
        for analysis_id in row_ids {
            let Some(row) = self.sheet.row(analysis_id) else {
                continue;
            };
            let snapshot = to_snapshot(row, saved_at);

            let outcome = if self.sheet.is_unpersisted(analysis_id) {
                self.insert_new(analysis_id, &snapshot).await
            } else {
                self.update_existing(row, analysis_id, &snapshot).await
            };

            match outcome {
                SaveOutcome::Saved => {
                    self.sheet.mark_row_saved(analysis_id, saved_at);
                    report.saved.push(analysis_id);
                }
                SaveOutcome::Stale => {
                    tracing::warn!(%analysis_id, "skipping save over a newer snapshot");
                    report.stale.push(analysis_id);
                }
                SaveOutcome::Failed(error) => {
                    tracing::warn!(%analysis_id, %error, "row save failed");
                    report.failed.push(SaveFailure { analysis_id, error });
                }
            }
        }

        for analysis_id in self.sheet.take_pending_removals() {
            match self.storage.analyses.delete(analysis_id).await {
                // Already gone is fine; the goal was removal.
                Ok(()) | Err(StorageError::NotFound) => {}
                Err(error) => {
                    tracing::warn!(%analysis_id, %error, "manual row removal failed");
                    self.sheet.restore_pending_removal(analysis_id);
                    report.failed.push(SaveFailure { analysis_id, error });
                }
            }
        }

        self.sheet.set_dirty(!report.is_complete());
        report
    }

    /// Refuse to close while edits are unsaved, unless the operator has
    /// explicitly confirmed the discard. Manual overrides cannot be
    /// reconstructed from AI output, so an accidental discard is lossy.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::UnsavedChanges` while dirty and not discarding.
    pub fn close(&self, discard: bool) -> Result<(), SheetError> {
        if self.sheet.has_unsaved_changes() && !discard {
            return Err(SheetError::UnsavedChanges);
        }
        Ok(())
    }

    /// Rebuild the sheet from the store, e.g. after an analysis job
    /// completed. Local edits are only thrown away when `discard` is set.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::UnsavedChanges` while dirty and not discarding,
    /// or `SheetError::Storage` if the batch cannot be re-read.
    pub async fn reload(&mut self, discard: bool) -> Result<(), SheetError> {
        if self.sheet.has_unsaved_changes() && !discard {
            return Err(SheetError::UnsavedChanges);
        }
        let batch_id = self.sheet.batch_id();
        let settings = SettingsService::new(Arc::clone(&self.storage.settings))
            .load()
            .await;
        let certifications = match self.storage.certification_types.list_active().await {
            Ok(types) => types,
            Err(err) => {
                tracing::warn!(error = %err, "certification types unavailable, pricing without them");
                Vec::new()
            }
        };
        let results = self.storage.analyses.list_for_batch(batch_id).await?;
        self.sheet = Sheet::build(batch_id, settings, certifications, results);
        Ok(())
    }

    /// Per-page counts for one file, fetched lazily and cached for the
    /// sheet's lifetime. Never refetched for the same file.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Analysis` if the fetch fails; nothing is cached
    /// in that case.
    pub async fn page_detail(&mut self, file_id: FileId) -> Result<&PageDetail, SheetError> {
        match self.page_details.entry(file_id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let detail = self.client.page_detail(file_id).await?;
                Ok(entry.insert(detail))
            }
        }
    }

    /// Submit the previously analysed files for a fresh analysis run.
    ///
    /// The existing job is never mutated; a new job is produced and the
    /// caller decides whether to monitor it.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Analysis` if submission fails.
    pub async fn reanalyse(&self) -> Result<AnalysisJob, SheetError> {
        let file_ids = self.sheet.analysed_file_ids();
        let job = self
            .client
            .submit(self.sheet.batch_id(), &file_ids)
            .await?;
        Ok(job)
    }

    async fn insert_new(
        &self,
        analysis_id: AnalysisId,
        snapshot: &PricingSnapshot,
    ) -> SaveOutcome {
        let Some(result) = self.sheet.result_of(analysis_id) else {
            return SaveOutcome::Failed(StorageError::NotFound);
        };
        let mut record = result.clone();
        record.pricing = Some(snapshot.clone());
        match self.storage.analyses.insert(&record).await {
            Ok(()) => SaveOutcome::Saved,
            Err(error) => SaveOutcome::Failed(error),
        }
    }

    async fn update_existing(
        &self,
        row: &PricingRow,
        analysis_id: AnalysisId,
        snapshot: &PricingSnapshot,
    ) -> SaveOutcome {
        let stored = match self.storage.analyses.current_saved_at(analysis_id).await {
            Ok(saved_at) => saved_at,
            Err(error) => return SaveOutcome::Failed(error),
        };
        let is_stale = match (stored, row.loaded_saved_at) {
            (Some(stored), Some(loaded)) => stored > loaded,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if is_stale {
            return SaveOutcome::Stale;
        }

        match self.storage.analyses.update_pricing(analysis_id, snapshot).await {
            Ok(()) => SaveOutcome::Saved,
            Err(error) => SaveOutcome::Failed(error),
        }
    }
}

enum SaveOutcome {
    Saved,
    Stale,
    Failed(StorageError),
}

/// Capture a row's current state as its persisted snapshot.
fn to_snapshot(row: &PricingRow, saved_at: DateTime<Utc>) -> PricingSnapshot {
    PricingSnapshot {
        billable_pages: row.billable_pages,
        complexity: row.complexity,
        complexity_multiplier: row.complexity_multiplier,
        base_rate: row.base_rate,
        certification_type_id: row.default_certification_type_id,
        is_excluded: row.is_excluded,
        is_billable_overridden: row.billable_pages_overridden,
        document_certifications: row.has_per_doc_cert_overrides.then(|| {
            row.document_certifications
                .iter()
                .filter_map(|entry| {
                    entry
                        .certification_type_id
                        .map(|certification_type_id| SnapshotCertification {
                            index: entry.index,
                            certification_type_id,
                        })
                })
                .collect()
        }),
        saved_at,
    }
}
