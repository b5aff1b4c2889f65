use std::sync::Arc;
use std::time::Duration;

use quote_core::Clock;
use quote_core::model::{AnalysisJob, BatchId, FileId, JobId};
use storage::repository::{Storage, StorageError};
use storage::sqlite::SqliteInitError;
use thiserror::Error;

use crate::analysis_client::AnalysisClient;
use crate::error::{AnalysisClientError, SheetError};
use crate::job_monitor::{DEFAULT_POLL_INTERVAL, JobMonitor, JobMonitorHandle};
use crate::sheet::SheetService;

/// Errors emitted while bootstrapping or driving the app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Analysis(#[from] AnalysisClientError),
}

/// Assembles the engine's collaborators and hands out per-batch sheets.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    client: Arc<dyn AnalysisClient>,
    clock: Clock,
    poll_interval: Duration,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        client: Arc<dyn AnalysisClient>,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(storage, client, clock))
    }

    #[must_use]
    pub fn new(storage: Storage, client: Arc<dyn AnalysisClient>, clock: Clock) -> Self {
        Self {
            storage,
            client,
            clock,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the job polling interval (tests use milliseconds).
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Open the working pricing sheet for a batch.
    ///
    /// # Errors
    ///
    /// Returns `SheetError` if the batch's analysis results cannot be read.
    pub async fn open_sheet(&self, batch_id: BatchId) -> Result<SheetService, SheetError> {
        SheetService::load(
            self.storage.clone(),
            Arc::clone(&self.client),
            self.clock,
            batch_id,
        )
        .await
    }

    /// Submit the selected files for analysis and start monitoring the
    /// resulting job. Already-terminal jobs get a monitor that reports
    /// them as-is without polling.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the submission fails.
    pub async fn analyse_files(
        &self,
        batch_id: BatchId,
        file_ids: &[FileId],
    ) -> Result<(AnalysisJob, JobMonitorHandle), AppServicesError> {
        let job = self.client.submit(batch_id, file_ids).await?;
        let handle = self.monitor(job.clone());
        Ok((job, handle))
    }

    /// Start monitoring an existing job.
    #[must_use]
    pub fn monitor(&self, job: AnalysisJob) -> JobMonitorHandle {
        JobMonitor::spawn(Arc::clone(&self.client), job, self.poll_interval)
    }

    /// Pull a terminal job's results into the record store so the next
    /// sheet build sees them. Records that already exist are left alone;
    /// re-analysis produces fresh records under new ids.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the results cannot be fetched;
    /// individual insert conflicts are skipped, other insert failures
    /// propagate.
    pub async fn ingest_results(&self, job_id: JobId) -> Result<u32, AppServicesError> {
        let results = self.client.results(job_id).await?;
        let mut inserted = 0_u32;
        for result in &results {
            match self.storage.analyses.insert(result).await {
                Ok(()) => inserted += 1,
                Err(StorageError::Conflict) => {
                    tracing::debug!(analysis_id = %result.id, "analysis record already present");
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(inserted)
    }
}
