use movshift_core::Config;
use movshift_storage::{remove_idempotent, DeleteOutcome, StorageResult};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Arms one-shot expiry timers for converted artifacts.
///
/// Timers live only in process memory. A restart loses them, which is why
/// [`crate::JanitorSweep`] exists. There is no cancellation: when the artifact
/// has already been delivered or swept, the timer fires into a no-op delete.
#[derive(Clone)]
pub struct RetentionScheduler {
    default_ttl: Duration,
    tracker: TaskTracker,
}

impl RetentionScheduler {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            tracker: TaskTracker::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.output_ttl())
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Schedule deletion of `path` after the default TTL.
    pub fn schedule(&self, path: PathBuf) -> JoinHandle<StorageResult<DeleteOutcome>> {
        self.schedule_deletion(path, self.default_ttl)
    }

    /// Schedule deletion of `path` once `ttl` has elapsed. The handle resolves
    /// to the delete outcome, which has already been logged.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_deletion(
        &self,
        path: PathBuf,
        ttl: Duration,
    ) -> JoinHandle<StorageResult<DeleteOutcome>> {
        tracing::debug!(
            path = %path.display(),
            ttl_secs = ttl.as_secs(),
            "Retention timer armed"
        );

        self.tracker.spawn(async move {
            tokio::time::sleep(ttl).await;

            let result = remove_idempotent(&path).await;
            match &result {
                Ok(DeleteOutcome::Removed) => {
                    tracing::info!(
                        path = %path.display(),
                        outcome = %DeleteOutcome::Removed,
                        "Expired artifact deleted"
                    );
                }
                Ok(DeleteOutcome::AlreadyAbsent) => {
                    tracing::info!(
                        path = %path.display(),
                        outcome = %DeleteOutcome::AlreadyAbsent,
                        "Expired artifact was already gone"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        path = %path.display(),
                        "Failed to delete expired artifact"
                    );
                }
            }
            result
        })
    }
}
