//! The three deletion actors racing on one converted artifact.
//!
//! Run with: `cargo test -p movshift-services --test reclamation_test`

use chrono::Utc;
use futures::StreamExt;
use movshift_services::{DeliveryError, DeliveryGate, JanitorSweep, RetentionScheduler};
use movshift_storage::{DeleteOutcome, LocalStore};
use std::time::Duration;
use tempfile::tempdir;

struct Outcomes {
    removed: usize,
    errors: usize,
}

impl Outcomes {
    fn record(&mut self, outcome: Result<DeleteOutcome, String>) {
        match outcome {
            Ok(DeleteOutcome::Removed) => self.removed += 1,
            Ok(DeleteOutcome::AlreadyAbsent) => {}
            Err(_) => self.errors += 1,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delivery_retention_and_sweep_delete_once() {
    for _ in 0..20 {
        let dir = tempdir().unwrap();
        let staging = LocalStore::new(dir.path().join("uploads"));
        let output = LocalStore::new(dir.path().join("converted"));
        output.ensure_root().await.unwrap();
        staging.ensure_root().await.unwrap();
        let artifact = output.path_for("clip.mp4").unwrap();
        std::fs::write(&artifact, b"converted frames").unwrap();

        let gate = DeliveryGate::new(staging.clone(), output.clone(), "mov");
        let retention = RetentionScheduler::new(Duration::from_secs(3600));
        let sweep = JanitorSweep::new(
            vec![staging.clone(), output.clone()],
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );

        let deliver = async {
            match gate.deliver("clip.mp4").await {
                Ok(delivery) => {
                    let (stream, done) = delivery.into_parts();
                    stream.for_each(|_| async {}).await;
                    Some(done.await.unwrap().map_err(|e| e.to_string()))
                }
                Err(DeliveryError::NotFound(_)) => None,
                Err(e) => Some(Err(e.to_string())),
            }
        };
        let expire = async {
            retention
                .schedule_deletion(artifact.clone(), Duration::ZERO)
                .await
                .unwrap()
                .map_err(|e| e.to_string())
        };
        let sweep_run = sweep.sweep_at(Utc::now() + chrono::Duration::hours(2));

        let (delivered, expired, report) = tokio::join!(deliver, expire, sweep_run);

        let mut outcomes = Outcomes {
            removed: report.removed,
            errors: report.failed,
        };
        if let Some(delivered) = delivered {
            outcomes.record(delivered);
        }
        outcomes.record(expired);

        assert_eq!(outcomes.removed, 1, "exactly one actor removes the artifact");
        assert_eq!(outcomes.errors, 0);
        assert_eq!(std::fs::read_dir(output.root()).unwrap().count(), 0);
    }
}

#[tokio::test]
async fn test_late_actors_see_already_absent() {
    let dir = tempdir().unwrap();
    let staging = LocalStore::new(dir.path().join("uploads"));
    let output = LocalStore::new(dir.path().join("converted"));
    output.ensure_root().await.unwrap();
    let artifact = output.path_for("clip.mp4").unwrap();
    std::fs::write(&artifact, b"converted frames").unwrap();

    let gate = DeliveryGate::new(staging.clone(), output.clone(), "mov");
    let (stream, done) = gate.deliver("clip.mp4").await.unwrap().into_parts();
    stream.for_each(|_| async {}).await;
    assert_eq!(done.await.unwrap().unwrap(), DeleteOutcome::Removed);

    let retention = RetentionScheduler::new(Duration::from_secs(3600));
    let expired = retention
        .schedule_deletion(artifact.clone(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(expired.unwrap(), DeleteOutcome::AlreadyAbsent);

    let sweep = JanitorSweep::new(
        vec![staging, output],
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );
    let report = sweep.sweep_at(Utc::now() + chrono::Duration::hours(2)).await;
    assert_eq!(report.removed, 0);
    assert_eq!(report.failed, 0);

    assert!(matches!(
        gate.deliver("clip.mp4").await,
        Err(DeliveryError::NotFound(_))
    ));
}
