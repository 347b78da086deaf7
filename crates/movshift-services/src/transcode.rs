use crate::guard::DiscardGuard;
use crate::retention::RetentionScheduler;
use chrono::Utc;
use movshift_core::{
    AppError, Config, ConversionJob, InvalidTransition, JobProgress, OutputArtifact,
    UploadArtifact,
};
use movshift_processing::{EncodeOutcome, Encoder, ProgressObserver, ProgressUpdate};
use movshift_storage::{remove_idempotent, LocalStore, StorageError};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The encoder ran and failed; the message is the encoder's own.
    #[error("{message}")]
    Failed { message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    State(#[from] InvalidTransition),
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Failed { message } => AppError::Conversion(message),
            ConversionError::Storage(StorageError::InvalidName(name)) => {
                AppError::Validation(format!("Invalid filename: {}", name))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Feeds encoder progress into the job and the log.
struct JobObserver {
    job_id: Uuid,
    progress: JobProgress,
}

impl ProgressObserver for JobObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.progress.on_progress(update);
        tracing::debug!(
            job_id = %self.job_id,
            percent = self.progress.percent(),
            out_time_ms = update.out_time.as_millis() as u64,
            "Conversion progress"
        );
    }
}

/// Drives one staged upload through the encoder.
///
/// The coordinator owns the input from the moment `convert` is called: on
/// every terminal path (success, encoder failure, or an error before the
/// encoder even ran) the input is deleted before `convert` returns. On success
/// the output is handed to the retention scheduler; on failure any partial
/// output is deleted as well. If the `convert` future is dropped before it
/// finishes, both the input and any partial output are deleted in the
/// background.
#[derive(Clone)]
pub struct TranscodeCoordinator {
    staging: LocalStore,
    output: LocalStore,
    encoder: Arc<dyn Encoder>,
    retention: RetentionScheduler,
    target_extension: String,
}

impl TranscodeCoordinator {
    pub fn new(
        staging: LocalStore,
        output: LocalStore,
        encoder: Arc<dyn Encoder>,
        retention: RetentionScheduler,
        target_extension: impl Into<String>,
    ) -> Self {
        Self {
            staging,
            output,
            encoder,
            retention,
            target_extension: target_extension.into(),
        }
    }

    pub fn from_config(
        config: &Config,
        encoder: Arc<dyn Encoder>,
        retention: RetentionScheduler,
    ) -> Self {
        Self::new(
            LocalStore::new(config.staging_dir()),
            LocalStore::new(config.output_dir()),
            encoder,
            retention,
            config.target_extension(),
        )
    }

    /// Name of the output artifact for a staged input: same stem, target extension.
    ///
    /// Two inputs with the same stem map to the same output name.
    pub fn output_name_for(&self, input: &UploadArtifact) -> String {
        format!("{}.{}", input.stem(), self.target_extension)
    }

    /// Convert a staged upload and return the resulting output artifact.
    #[tracing::instrument(
        skip(self, input),
        fields(input = %input.path.display(), job_id = tracing::field::Empty)
    )]
    pub async fn convert(&self, input: UploadArtifact) -> Result<OutputArtifact, ConversionError> {
        let input_path = input.path.clone();

        let output_path = match self.prepare(&input).await {
            Ok(path) => path,
            Err(e) => {
                delete_logged(&input_path, "input").await;
                return Err(e);
            }
        };

        let guard = DiscardGuard::new(
            "conversion",
            vec![input_path.clone(), output_path.clone()],
        );

        let mut job = ConversionJob::new(input, output_path);
        tracing::Span::current().record("job_id", tracing::field::display(job.id));

        job.start()?;
        tracing::info!(
            job_id = %job.id,
            output = %job.output_path.display(),
            "Conversion started"
        );

        let start = Instant::now();
        let observer = JobObserver {
            job_id: job.id,
            progress: job.progress(),
        };
        let outcome = self
            .encoder
            .encode(job.input_path(), &job.output_path, &observer)
            .await;

        let outcome = match outcome {
            EncodeOutcome::Succeeded { output } if !exists(&output).await => {
                EncodeOutcome::Failed {
                    message: "Encoder reported success but produced no output".to_string(),
                }
            }
            other => other,
        };

        // The encoder is done with the input either way.
        delete_logged(job.input_path(), "input").await;

        match outcome {
            EncodeOutcome::Succeeded { output } => {
                self.retention.schedule(output.clone());
                job.succeed()?;

                tracing::info!(
                    job_id = %job.id,
                    output = %output.display(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Conversion succeeded"
                );

                guard.disarm();
                Ok(OutputArtifact::new(
                    output,
                    Utc::now(),
                    self.retention.default_ttl(),
                ))
            }
            EncodeOutcome::Failed { message } => {
                delete_logged(&job.output_path, "partial output").await;
                job.fail()?;

                tracing::warn!(
                    job_id = %job.id,
                    error = %message,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Conversion failed"
                );

                guard.disarm();
                Err(ConversionError::Failed { message })
            }
        }
    }

    async fn prepare(&self, input: &UploadArtifact) -> Result<std::path::PathBuf, ConversionError> {
        self.staging.ensure_root().await?;
        self.output.ensure_root().await?;
        Ok(self.output.path_for(&self.output_name_for(input))?)
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn delete_logged(path: &Path, role: &'static str) {
    match remove_idempotent(path).await {
        Ok(outcome) => {
            tracing::info!(
                path = %path.display(),
                role = role,
                outcome = %outcome,
                "Conversion artifact deleted"
            );
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                path = %path.display(),
                role = role,
                "Failed to delete conversion artifact"
            );
        }
    }
}
