use bytes::Bytes;
use futures::Stream;
use movshift_core::{AppError, Config};
use movshift_storage::{
    remove_idempotent, validate_name, DeleteOutcome, LocalStore, StorageError, StorageResult,
};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const CLAIM_PREFIX: &str = ".delivering-";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("File not found")]
    NotFound(String),

    #[error("Invalid filename: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for DeliveryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => DeliveryError::NotFound(name),
            StorageError::InvalidName(name) => DeliveryError::InvalidName(name),
            other => DeliveryError::Storage(other),
        }
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::NotFound(_) => AppError::NotFound("File not found".to_string()),
            DeliveryError::InvalidName(name) => {
                AppError::Validation(format!("Invalid filename: {}", name))
            }
            DeliveryError::Storage(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Serves each converted artifact at most once.
///
/// A delivery starts by renaming the artifact to a private claim name inside
/// the output store. The rename is atomic, so of two concurrent requests for
/// the same name exactly one gets the file and the other sees `NotFound`. The
/// claimed file is streamed from its private name and deleted, together with
/// any staging counterpart, once the stream ends for any reason.
#[derive(Debug, Clone)]
pub struct DeliveryGate {
    staging: LocalStore,
    output: LocalStore,
    source_extension: String,
}

impl DeliveryGate {
    pub fn new(staging: LocalStore, output: LocalStore, source_extension: impl Into<String>) -> Self {
        Self {
            staging,
            output,
            source_extension: source_extension.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LocalStore::new(config.staging_dir()),
            LocalStore::new(config.output_dir()),
            config.source_extension(),
        )
    }

    /// Staging name a delivered output came from (`clip.mp4` -> `clip.mov`).
    pub fn source_name_for(&self, file_name: &str) -> String {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        format!("{}.{}", stem, self.source_extension)
    }

    /// Claim and open an output artifact for streaming.
    #[tracing::instrument(skip(self))]
    pub async fn deliver(&self, file_name: &str) -> Result<Delivery, DeliveryError> {
        validate_name(file_name)?;

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let claim_name = format!("{}{}.{}", CLAIM_PREFIX, Uuid::new_v4(), extension);
        let claimed = self.output.claim(file_name, &claim_name).await?;

        let (done_tx, done_rx) = oneshot::channel();
        let cleanup = CleanupGuard {
            file_name: file_name.to_string(),
            claimed: claimed.clone(),
            source: self.staging.root().join(self.source_name_for(file_name)),
            done: Some(done_tx),
        };

        // From here on the guard owns the claimed file; an open failure drops it
        // and runs the cascade.
        let (inner, content_length) = self.output.open_stream(&claimed).await?;

        tracing::info!(
            filename = %file_name,
            claimed = %claimed.display(),
            size = content_length,
            "Delivery started"
        );

        Ok(Delivery {
            file_name: file_name.to_string(),
            content_length,
            stream: DeliveryStream {
                inner,
                cleanup: Some(cleanup),
            },
            done: done_rx,
        })
    }
}

/// An artifact claimed for delivery.
pub struct Delivery {
    pub file_name: String,
    pub content_length: u64,
    pub stream: DeliveryStream,
    done: oneshot::Receiver<StorageResult<DeleteOutcome>>,
}

impl Delivery {
    /// Split into the body stream and a receiver that resolves once the
    /// cleanup cascade has finished, carrying the outcome of deleting the
    /// delivered output.
    pub fn into_parts(
        self,
    ) -> (
        DeliveryStream,
        oneshot::Receiver<StorageResult<DeleteOutcome>>,
    ) {
        (self.stream, self.done)
    }
}

/// Byte stream of a claimed artifact.
///
/// The cleanup cascade starts when the stream yields its last chunk, yields
/// an error, or is dropped before completion.
pub struct DeliveryStream {
    inner: ReaderStream<tokio::fs::File>,
    cleanup: Option<CleanupGuard>,
}

impl Stream for DeliveryStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.inner).poll_next(cx);
        match &poll {
            Poll::Ready(None) => {
                self.cleanup.take();
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(error = %e, "Delivery stream failed");
                self.cleanup.take();
            }
            _ => {}
        }
        poll
    }
}

/// Runs the post-delivery cascade when dropped.
struct CleanupGuard {
    file_name: String,
    claimed: PathBuf,
    source: PathBuf,
    done: Option<oneshot::Sender<StorageResult<DeleteOutcome>>>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let file_name = std::mem::take(&mut self.file_name);
        let claimed = std::mem::take(&mut self.claimed);
        let source = std::mem::take(&mut self.source);
        let done = self.done.take();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let outcome = cascade(&file_name, &claimed, &source).await;
                    if let Some(done) = done {
                        let _ = done.send(outcome);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    filename = %file_name,
                    claimed = %claimed.display(),
                    "No runtime for delivery cleanup, leaving files to the janitor sweep"
                );
            }
        }
    }
}

/// Delete the delivered output, then its staging counterpart if still present.
/// Returns the outcome for the output.
async fn cascade(
    file_name: &str,
    claimed: &Path,
    source: &Path,
) -> StorageResult<DeleteOutcome> {
    let output = remove_idempotent(claimed).await;
    log_cleanup(file_name, "output", claimed, &output);

    let staged = remove_idempotent(source).await;
    log_cleanup(file_name, "source", source, &staged);

    output
}

fn log_cleanup(file_name: &str, role: &str, path: &Path, result: &StorageResult<DeleteOutcome>) {
    match result {
        Ok(outcome) => {
            tracing::info!(
                filename = %file_name,
                role = role,
                path = %path.display(),
                outcome = %outcome,
                "Delivery cleanup"
            );
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                filename = %file_name,
                role = role,
                path = %path.display(),
                "Delivery cleanup failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        staging: PathBuf,
        output: PathBuf,
        gate: DeliveryGate,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("uploads");
        let output = dir.path().join("converted");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        let gate = DeliveryGate::new(
            LocalStore::new(&staging),
            LocalStore::new(&output),
            "mov",
        );
        Fixture {
            _dir: dir,
            staging,
            output,
            gate,
        }
    }

    async fn drain(stream: DeliveryStream) -> Vec<u8> {
        stream
            .map(|chunk| chunk.unwrap().to_vec())
            .collect::<Vec<_>>()
            .await
            .concat()
    }

    #[tokio::test]
    async fn test_deliver_once_then_not_found() {
        let f = fixture();
        std::fs::write(f.output.join("clip.mp4"), b"converted").unwrap();
        std::fs::write(f.staging.join("clip.mov"), b"source").unwrap();

        let delivery = f.gate.deliver("clip.mp4").await.unwrap();
        assert_eq!(delivery.content_length, 9);
        assert_eq!(delivery.file_name, "clip.mp4");

        let (stream, done) = delivery.into_parts();
        assert_eq!(drain(stream).await, b"converted");
        assert_eq!(done.await.unwrap().unwrap(), DeleteOutcome::Removed);

        assert!(!f.output.join("clip.mp4").exists());
        assert!(!f.staging.join("clip.mov").exists());
        assert_eq!(std::fs::read_dir(&f.output).unwrap().count(), 0);

        let second = f.gate.deliver("clip.mp4").await;
        assert!(matches!(second, Err(DeliveryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let f = fixture();
        let err = f.gate.deliver("never.mp4").await.err().unwrap();
        assert!(matches!(err, DeliveryError::NotFound(_)));

        let app: AppError = err.into();
        assert!(matches!(app, AppError::NotFound(ref m) if m == "File not found"));
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let f = fixture();
        for name in ["../uploads/clip.mov", ".delivering-x.mp4", ""] {
            let err = f.gate.deliver(name).await.err().unwrap();
            assert!(matches!(err, DeliveryError::InvalidName(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn test_dropped_stream_still_cleans_up() {
        let f = fixture();
        std::fs::write(f.output.join("clip.mp4"), b"converted").unwrap();

        let (stream, done) = f.gate.deliver("clip.mp4").await.unwrap().into_parts();
        drop(stream);
        done.await.unwrap().unwrap();

        assert_eq!(std::fs::read_dir(&f.output).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_counterpart_is_fine() {
        let f = fixture();
        std::fs::write(f.output.join("clip.mp4"), b"converted").unwrap();

        let (stream, done) = f.gate.deliver("clip.mp4").await.unwrap().into_parts();
        drain(stream).await;
        done.await.unwrap().unwrap();

        assert!(!f.output.join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_have_one_winner() {
        let f = fixture();
        std::fs::write(f.output.join("clip.mp4"), b"converted").unwrap();

        let (a, b) = tokio::join!(f.gate.deliver("clip.mp4"), f.gate.deliver("clip.mp4"));
        let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(winners, 1);

        let delivery = a.or(b).unwrap();
        let (stream, done) = delivery.into_parts();
        assert_eq!(drain(stream).await, b"converted");
        done.await.unwrap().unwrap();
    }

    #[test]
    fn test_source_name_reverses_extension() {
        let f = fixture();
        assert_eq!(f.gate.source_name_for("clip.mp4"), "clip.mov");
        assert_eq!(f.gate.source_name_for("my.holiday.mp4"), "my.holiday.mov");
    }
}
