use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use quote_core::model::AnalysisJob;

use crate::analysis_client::AnalysisClient;

/// The observed production policy: poll every 10 seconds while a job is in
/// flight.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Watches one analysis job until it reaches a terminal state.
///
/// The monitor is an explicit task with cancellation tied to the handle's
/// lifetime, not to any UI: dropping the [`JobMonitorHandle`] stops the
/// polling. Poll errors are logged and retried at the next tick; only a
/// terminal job status stops the loop.
pub struct JobMonitor;

impl JobMonitor {
    /// Start polling `job` on a fixed interval.
    ///
    /// A job that is already terminal (synchronous single-shot analysis)
    /// never starts a polling task; subscribers observe the terminal state
    /// immediately.
    #[must_use]
    pub fn spawn(
        client: Arc<dyn AnalysisClient>,
        job: AnalysisJob,
        interval: Duration,
    ) -> JobMonitorHandle {
        let (tx, rx) = watch::channel(job.clone());
        let (refresh_tx, mut refresh_rx) = mpsc::channel::<()>(1);

        if job.status.is_terminal() {
            return JobMonitorHandle {
                rx,
                refresh_tx,
                task: None,
            };
        }

        let job_id = job.id;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    received = refresh_rx.recv() => {
                        if received.is_none() {
                            // Every handle clone is gone; stop polling.
                            break;
                        }
                    }
                }

                match client.poll(job_id).await {
                    Ok(polled) => {
                        let terminal = polled.status.is_terminal();
                        if tx.send(polled).is_err() {
                            break;
                        }
                        if terminal {
                            tracing::debug!(%job_id, "analysis job reached terminal state");
                            break;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%job_id, %error, "job poll failed, retrying next tick");
                    }
                }
            }
        });

        JobMonitorHandle {
            rx,
            refresh_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running monitor. Dropping it cancels the polling task.
pub struct JobMonitorHandle {
    rx: watch::Receiver<AnalysisJob>,
    refresh_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl JobMonitorHandle {
    /// Subscribe to job updates. Each observed state (including the
    /// initial one) is available through the receiver.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AnalysisJob> {
        self.rx.clone()
    }

    /// The most recently observed job state.
    #[must_use]
    pub fn latest(&self) -> AnalysisJob {
        self.rx.borrow().clone()
    }

    /// Trigger one out-of-band poll ("refresh status"). A no-op once the
    /// job is terminal or the monitor was cancelled.
    pub fn refresh_now(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    /// Wait until the job reaches a terminal state and return it.
    pub async fn await_terminal(&self) -> AnalysisJob {
        let mut rx = self.rx.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if current.status.is_terminal() {
                return current;
            }
            if rx.changed().await.is_err() {
                // Sender gone; the last observed state is all there is.
                return rx.borrow().clone();
            }
        }
    }

    /// Stop polling immediately.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for JobMonitorHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
