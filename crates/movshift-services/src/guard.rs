//! Cleanup for work abandoned at an await point.

use movshift_storage::remove_idempotent;
use std::path::PathBuf;

/// Deletes its files when dropped, unless disarmed first.
///
/// Armed around steps that may never resume, such as a handler future dropped
/// after its client disconnected. Deletion runs on a spawned task.
pub(crate) struct DiscardGuard {
    operation: &'static str,
    paths: Vec<PathBuf>,
}

impl DiscardGuard {
    pub(crate) fn new(operation: &'static str, paths: Vec<PathBuf>) -> Self {
        Self { operation, paths }
    }

    /// The operation reached a terminal state and did its own cleanup.
    pub(crate) fn disarm(mut self) {
        self.paths.clear();
    }
}

impl Drop for DiscardGuard {
    fn drop(&mut self) {
        if self.paths.is_empty() {
            return;
        }

        let operation = self.operation;
        let paths = std::mem::take(&mut self.paths);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(operation = operation, "Operation abandoned, discarding its files");
                handle.spawn(async move {
                    for path in paths {
                        match remove_idempotent(&path).await {
                            Ok(outcome) => {
                                tracing::info!(
                                    operation = operation,
                                    path = %path.display(),
                                    outcome = %outcome,
                                    "Abandoned file discarded"
                                );
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    operation = operation,
                                    path = %path.display(),
                                    "Failed to discard abandoned file"
                                );
                            }
                        }
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    operation = operation,
                    "No runtime to discard abandoned files, leaving them to the janitor sweep"
                );
            }
        }
    }
}
