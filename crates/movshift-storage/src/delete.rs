//! The one deletion primitive every cleanup path uses.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use crate::{StorageError, StorageResult};

/// Result of a successful deletion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The file existed and this call removed it.
    Removed,
    /// The file was already gone; another actor won the race.
    AlreadyAbsent,
}

impl DeleteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteOutcome::Removed => "removed",
            DeleteOutcome::AlreadyAbsent => "already_absent",
        }
    }
}

impl std::fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delete a file, treating "not found" as success.
///
/// No existence check precedes the unlink; a `NotFound` from the unlink itself
/// is what identifies the already-absent case.
pub async fn remove_idempotent(path: &Path) -> StorageResult<DeleteOutcome> {
    let start = Instant::now();

    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(
                path = %path.display(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "File removed"
            );
            Ok(DeleteOutcome::Removed)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteOutcome::AlreadyAbsent),
        Err(source) => Err(StorageError::DeleteFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_removes_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();

        let outcome = remove_idempotent(&path).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never-existed.mp4");

        let outcome = remove_idempotent(&path).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
    }

    #[tokio::test]
    async fn test_second_delete_reports_already_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();

        assert_eq!(remove_idempotent(&path).await.unwrap(), DeleteOutcome::Removed);
        assert_eq!(
            remove_idempotent(&path).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn test_concurrent_deletes_remove_exactly_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();

        let attempts = (0..8).map(|_| {
            let path = path.clone();
            tokio::spawn(async move { remove_idempotent(&path).await })
        });
        let outcomes: Vec<DeleteOutcome> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let removed = outcomes
            .iter()
            .filter(|o| **o == DeleteOutcome::Removed)
            .count();
        assert_eq!(removed, 1);
        assert_eq!(outcomes.len(), 8);
    }

    #[tokio::test]
    async fn test_directory_is_a_real_failure() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("nested");
        tokio::fs::create_dir(&sub).await.unwrap();

        let result = remove_idempotent(&sub).await;
        assert!(matches!(result, Err(StorageError::DeleteFailed { .. })));
    }
}
