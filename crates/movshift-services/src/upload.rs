use crate::guard::DiscardGuard;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use movshift_core::{AppError, UploadArtifact};
use movshift_processing::{UploadValidator, ValidationError};
use movshift_storage::{remove_idempotent, LocalStore, StorageError};
use std::fmt::Display;
use std::path::Path;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to read upload body: {0}")]
    Body(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to write staged file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(e) if e.is_size_error() => {
                AppError::PayloadTooLarge(e.to_string())
            }
            UploadError::Validation(e) => AppError::Validation(e.to_string()),
            UploadError::Body(msg) => AppError::Validation(msg),
            UploadError::Storage(StorageError::InvalidName(name)) => {
                AppError::Validation(format!("Invalid filename: {}", name))
            }
            UploadError::Storage(e) => AppError::Internal(e.to_string()),
            UploadError::Io(e) => AppError::from(e),
        }
    }
}

/// Writes incoming uploads into the staging store.
///
/// The name is checked before the staged file is created, so a rejected
/// extension never touches the disk. Anything that fails after that point
/// removes the partially written file before returning; an upload abandoned
/// mid-stream is removed in the background.
#[derive(Debug, Clone)]
pub struct UploadStager {
    store: LocalStore,
    validator: UploadValidator,
}

impl UploadStager {
    pub fn new(store: LocalStore, validator: UploadValidator) -> Self {
        Self { store, validator }
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Check a client-supplied filename and return the name it will be staged under.
    pub fn staged_name(&self, original_name: &str) -> Result<String, UploadError> {
        Ok(self.validator.staged_file_name(original_name)?)
    }

    /// Stream an upload body into the staging store.
    #[tracing::instrument(skip(self, body), fields(filename = %original_name))]
    pub async fn stage<S, E>(
        &self,
        original_name: &str,
        body: S,
    ) -> Result<UploadArtifact, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let staged_name = self.staged_name(original_name)?;
        let (path, mut file) = self.store.create(&staged_name).await?;
        let guard = DiscardGuard::new("upload", vec![path.clone()]);

        let result = self.write_body(&mut file, body).await;
        drop(file);

        match result {
            Ok(size) => {
                guard.disarm();
                tracing::info!(
                    path = %path.display(),
                    size = size,
                    "Upload staged"
                );
                Ok(UploadArtifact::new(path, original_name))
            }
            Err(e) => {
                discard(&path).await;
                guard.disarm();
                Err(e)
            }
        }
    }

    async fn write_body<S, E>(
        &self,
        file: &mut tokio::fs::File,
        mut body: S,
    ) -> Result<u64, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| UploadError::Body(e.to_string()))?;
            written += chunk.len() as u64;
            self.validator.validate_running_size(written)?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        self.validator.validate_file_size(written)?;
        Ok(written)
    }
}

async fn discard(path: &Path) {
    match remove_idempotent(path).await {
        Ok(outcome) => {
            tracing::info!(
                path = %path.display(),
                outcome = %outcome,
                "Rejected upload discarded"
            );
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                path = %path.display(),
                "Failed to discard rejected upload"
            );
        }
    }
}
