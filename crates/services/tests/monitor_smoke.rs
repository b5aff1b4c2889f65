//! Smoke tests for the batch job monitor's polling state machine, driven
//! with paused time and a scripted analysis client.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use quote_core::model::{
    AnalysisJob, AnalysisResult, BatchId, FileId, JobId, JobStatus, PageDetail,
};
use services::error::AnalysisClientError;
use services::{AnalysisClient, JobMonitor};

struct ScriptedClient {
    job: AnalysisJob,
    statuses: Mutex<VecDeque<JobStatus>>,
    poll_count: AtomicU32,
}

impl ScriptedClient {
    fn new(job: AnalysisJob, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        Self {
            job,
            statuses: Mutex::new(statuses.into_iter().collect()),
            poll_count: AtomicU32::new(0),
        }
    }

    fn polls(&self) -> u32 {
        self.poll_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisClient for ScriptedClient {
    async fn submit(
        &self,
        _batch_id: BatchId,
        _file_ids: &[FileId],
    ) -> Result<AnalysisJob, AnalysisClientError> {
        Ok(self.job.clone())
    }

    async fn poll(&self, _job_id: JobId) -> Result<AnalysisJob, AnalysisClientError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().expect("lock");
        let status = if statuses.len() > 1 {
            statuses.pop_front().expect("non-empty")
        } else {
            *statuses.front().expect("non-empty")
        };
        Ok(AnalysisJob {
            status,
            ..self.job.clone()
        })
    }

    async fn results(&self, _job_id: JobId) -> Result<Vec<AnalysisResult>, AnalysisClientError> {
        Ok(Vec::new())
    }

    async fn page_detail(&self, _file_id: FileId) -> Result<PageDetail, AnalysisClientError> {
        Err(AnalysisClientError::Disabled)
    }
}

fn job(status: JobStatus) -> AnalysisJob {
    AnalysisJob {
        id: JobId::generate(),
        batch_id: BatchId::generate(),
        status,
        total_files: 3,
        completed_files: 0,
        failed_files: 0,
    }
}

#[tokio::test(start_paused = true)]
async fn polls_until_terminal_then_stops() {
    let queued = job(JobStatus::Queued);
    let client = Arc::new(ScriptedClient::new(
        queued.clone(),
        [
            JobStatus::Processing,
            JobStatus::Processing,
            JobStatus::Completed,
        ],
    ));

    let handle = JobMonitor::spawn(
        Arc::clone(&client) as Arc<dyn AnalysisClient>,
        queued,
        Duration::from_secs(10),
    );
    let terminal = handle.await_terminal().await;

    assert_eq!(terminal.status, JobStatus::Completed);
    assert_eq!(client.polls(), 3);

    // Once terminal, further time passing triggers no more polls.
    tokio::time::advance(Duration::from_secs(60)).await;
    tokio::task::yield_now().await;
    assert_eq!(client.polls(), 3);
    assert_eq!(handle.latest().status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn failed_job_is_terminal_too() {
    let queued = job(JobStatus::Queued);
    let client = Arc::new(ScriptedClient::new(queued.clone(), [JobStatus::Failed]));

    let handle = JobMonitor::spawn(
        Arc::clone(&client) as Arc<dyn AnalysisClient>,
        queued,
        Duration::from_secs(10),
    );
    let terminal = handle.await_terminal().await;
    assert_eq!(terminal.status, JobStatus::Failed);
    assert_eq!(client.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn already_terminal_job_never_polls() {
    let completed = job(JobStatus::Completed);
    let client = Arc::new(ScriptedClient::new(
        completed.clone(),
        [JobStatus::Completed],
    ));

    let handle = JobMonitor::spawn(
        Arc::clone(&client) as Arc<dyn AnalysisClient>,
        completed,
        Duration::from_secs(10),
    );

    let terminal = handle.await_terminal().await;
    assert_eq!(terminal.status, JobStatus::Completed);

    tokio::time::advance(Duration::from_secs(60)).await;
    tokio::task::yield_now().await;
    assert_eq!(client.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_intermediate_states() {
    let queued = job(JobStatus::Queued);
    let client = Arc::new(ScriptedClient::new(
        queued.clone(),
        [JobStatus::Processing, JobStatus::Partial],
    ));

    let handle = JobMonitor::spawn(
        Arc::clone(&client) as Arc<dyn AnalysisClient>,
        queued,
        Duration::from_secs(10),
    );

    let mut rx = handle.subscribe();
    let mut observed = vec![rx.borrow_and_update().status];
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().status;
        observed.push(status);
        if status.is_terminal() {
            break;
        }
    }

    assert_eq!(
        observed,
        vec![JobStatus::Queued, JobStatus::Processing, JobStatus::Partial]
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling_mid_flight() {
    let queued = job(JobStatus::Queued);
    let client = Arc::new(ScriptedClient::new(
        queued.clone(),
        [JobStatus::Processing],
    ));

    let mut handle = JobMonitor::spawn(
        Arc::clone(&client) as Arc<dyn AnalysisClient>,
        queued,
        Duration::from_secs(10),
    );

    // Let the immediate first poll land, then cancel.
    tokio::task::yield_now().await;
    handle.cancel();
    let after_cancel = client.polls();

    tokio::time::advance(Duration::from_secs(120)).await;
    tokio::task::yield_now().await;
    assert_eq!(client.polls(), after_cancel);
    assert!(!handle.latest().status.is_terminal());
}
