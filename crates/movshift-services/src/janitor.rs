use chrono::{DateTime, Utc};
use movshift_core::Config;
use movshift_storage::{remove_idempotent, DeleteOutcome, LocalStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Counters for one sweep cycle across all stores.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub already_absent: usize,
    pub retained: usize,
    pub failed: usize,
}

/// Periodic age-based scan of the staging and output stores.
///
/// The sweep only looks at the filesystem: an entry older than `max_age` is
/// deleted no matter which job produced it or whether a retention timer is
/// still armed for it.
pub struct JanitorSweep {
    stores: Vec<LocalStore>,
    max_age: Duration,
    period: Duration,
}

impl JanitorSweep {
    pub fn new(stores: Vec<LocalStore>, max_age: Duration, period: Duration) -> Self {
        Self {
            stores,
            max_age,
            period,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            vec![
                LocalStore::new(config.staging_dir()),
                LocalStore::new(config.output_dir()),
            ],
            config.sweep_max_age(),
            config.sweep_interval(),
        )
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one sweep against the current wall clock.
    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep, treating `now` as the current time.
    #[tracing::instrument(skip(self), fields(max_age_secs = self.max_age.as_secs()))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for store in &self.stores {
            let entries = match store.list_entries().await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        root = %store.root().display(),
                        "Failed to list store, skipping"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            for entry in entries.into_iter().filter(|e| e.is_file) {
                report.scanned += 1;

                if entry.age_at(now) <= self.max_age {
                    report.retained += 1;
                    continue;
                }

                match remove_idempotent(&entry.path).await {
                    Ok(DeleteOutcome::Removed) => {
                        tracing::info!(
                            path = %entry.path.display(),
                            created_at = %entry.created_at,
                            "Swept stale artifact"
                        );
                        report.removed += 1;
                    }
                    Ok(DeleteOutcome::AlreadyAbsent) => {
                        tracing::info!(
                            path = %entry.path.display(),
                            "Stale artifact was already gone"
                        );
                        report.already_absent += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            path = %entry.path.display(),
                            "Failed to sweep artifact, continuing"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            removed = report.removed,
            already_absent = report.already_absent,
            retained = report.retained,
            failed = report.failed,
            "Sweep completed"
        );

        report
    }

    /// Start the background sweep loop. The first sweep runs immediately.
    pub fn start(self: Arc<Self>) -> JanitorHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                period_secs = self.period.as_secs(),
                max_age_secs = self.max_age.as_secs(),
                "Janitor sweep started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Janitor sweep stopping");
                        break;
                    }
                }
            }
        });

        JanitorHandle {
            shutdown_tx,
            handle,
        }
    }
}

/// Lifecycle handle for a running sweep loop.
pub struct JanitorHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl JanitorHandle {
    /// Signal the loop to stop and wait for it. A sweep in progress completes first.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Janitor sweep task panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sweep_for(stores: Vec<LocalStore>) -> JanitorSweep {
        JanitorSweep::new(stores, Duration::from_secs(3600), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_entries() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        std::fs::write(dir.path().join("clip.mp4"), b"frames").unwrap();

        let sweep = sweep_for(vec![store]);

        let report = sweep.sweep_at(Utc::now()).await;
        assert_eq!(report.scanned, 1);
        assert_eq!(report.retained, 1);
        assert!(dir.path().join("clip.mp4").exists());

        let later = Utc::now() + chrono::Duration::hours(2);
        let report = sweep.sweep_at(later).await;
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_sweep_covers_every_store() {
        let staging = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(staging.path().join("clip.mov"), b"source").unwrap();
        std::fs::write(output.path().join("clip.mp4"), b"frames").unwrap();

        let sweep = sweep_for(vec![
            LocalStore::new(staging.path()),
            LocalStore::new(output.path()),
        ]);

        let report = sweep.sweep_at(Utc::now() + chrono::Duration::hours(2)).await;
        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, 2);
        assert!(!staging.path().join("clip.mov").exists());
        assert!(!output.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_store_is_skipped() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("converted");
        std::fs::create_dir(&present).unwrap();
        std::fs::write(present.join("clip.mp4"), b"frames").unwrap();

        let sweep = sweep_for(vec![
            LocalStore::new(dir.path().join("uploads")),
            LocalStore::new(&present),
        ]);

        let report = sweep.sweep_at(Utc::now() + chrono::Duration::hours(2)).await;
        assert_eq!(report.failed, 0);
        assert_eq!(report.removed, 1);
    }

    #[tokio::test]
    async fn test_subdirectories_are_ignored() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let sweep = sweep_for(vec![LocalStore::new(dir.path())]);
        let report = sweep.sweep_at(Utc::now() + chrono::Duration::hours(2)).await;

        assert_eq!(report, SweepReport::default());
        assert!(dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_start_sweeps_immediately_and_stops() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"frames").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let sweep = Arc::new(JanitorSweep::new(
            vec![LocalStore::new(dir.path())],
            Duration::ZERO,
            Duration::from_secs(3600),
        ));
        let handle = sweep.start();

        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!path.exists());

        handle.stop().await;
    }
}
