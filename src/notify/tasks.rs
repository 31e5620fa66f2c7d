// Bounded, supervised work group for detached background jobs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::metrics::Metrics;

/// Work group for fire-and-forget jobs (fan-out, initial sync)
///
/// Callers never wait on a job. Internally every job is tracked so it can be
/// drained at shutdown, and at most `max_running` jobs hold a slot at once;
/// the rest queue on the semaphore. A monitor task observes each job's
/// completion so panics end up in the logs and metrics.
#[derive(Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    slots: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

/// Decrements the running gauge even if the job panics
struct RunningGuard(Arc<Metrics>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.background_jobs_running.dec();
    }
}

impl BackgroundTasks {
    pub fn new(max_running: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            tracker: TaskTracker::new(),
            slots: Arc::new(Semaphore::new(max_running.max(1))),
            metrics,
        }
    }

    /// Spawn a detached job labelled `job`
    pub fn spawn<F>(&self, job: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let metrics = Arc::clone(&self.metrics);

        let handle = tokio::spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(job, "Work group shut down, dropping job");
                    return;
                }
            };
            metrics.background_jobs_running.inc();
            let _running = RunningGuard(Arc::clone(&metrics));
            fut.await;
        });

        let metrics = Arc::clone(&self.metrics);
        self.tracker.spawn(async move {
            let outcome = match handle.await {
                Ok(()) => "completed",
                Err(e) if e.is_panic() => {
                    error!(job, "Background job panicked");
                    "panicked"
                }
                Err(_) => {
                    warn!(job, "Background job cancelled");
                    "cancelled"
                }
            };
            debug!(job, outcome, "Background job finished");
            metrics
                .background_jobs
                .with_label_values(&[job, outcome])
                .inc();
        });
    }

    /// Wait until every job spawned so far has finished, then accept new ones again
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Close the group and wait at most `drain` for running jobs
    ///
    /// Jobs still queued for a slot, and any spawned later, are dropped
    /// without running. Returns `true` if every job finished in time.
    pub async fn shutdown(&self, drain: Duration) -> bool {
        self.slots.close();
        self.tracker.close();
        let drained = tokio::time::timeout(drain, self.tracker.wait()).await.is_ok();
        if !drained {
            warn!(
                pending = self.tracker.len(),
                drain_secs = drain.as_secs(),
                "Background jobs still running at shutdown"
            );
        }
        drained
    }
}
