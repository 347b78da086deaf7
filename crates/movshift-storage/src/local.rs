use crate::delete::{remove_idempotent, DeleteOutcome};
use crate::keys::validate_name;
use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use tokio::fs;
use tokio_util::io::ReaderStream;

/// One entry found while listing a store.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub len: u64,
    pub is_file: bool,
}

impl StoredEntry {
    /// Age of the entry relative to `now`; entries stamped in the future are age zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }
}

/// A directory on the local filesystem holding artifacts addressed by file name.
///
/// Construction is cheap and does not touch the disk; the root is created on
/// demand by [`LocalStore::ensure_root`] or the first write.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory if it does not exist yet.
    pub async fn ensure_root(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Resolve a validated entry name to its path inside the store.
    pub fn path_for(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    pub async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.path_for(name)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Create (or truncate) an entry for writing.
    pub async fn create(&self, name: &str) -> StorageResult<(PathBuf, fs::File)> {
        let path = self.path_for(name)?;
        self.ensure_root().await?;
        let file = fs::File::create(&path).await?;
        Ok((path, file))
    }

    /// Delete an entry by name. Missing entries are reported, not treated as errors.
    pub async fn remove(&self, name: &str) -> StorageResult<DeleteOutcome> {
        let path = self.path_for(name)?;
        remove_idempotent(&path).await
    }

    /// Atomically move an entry to a private name inside the same store.
    ///
    /// Only one caller can claim a given entry; the others get `NotFound`.
    pub async fn claim(&self, name: &str, claim_name: &str) -> StorageResult<PathBuf> {
        let from = self.path_for(name)?;
        let to = self.root.join(claim_name);

        match fs::rename(&from, &to).await {
            Ok(()) => {
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "Entry claimed"
                );
                Ok(to)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    /// Open a file for streaming, returning the byte stream and its length.
    pub async fn open_stream(&self, path: &Path) -> StorageResult<(ReaderStream<fs::File>, u64)> {
        let file = fs::File::open(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            _ => StorageError::IoError(e),
        })?;
        let len = file.metadata().await?.len();
        Ok((ReaderStream::new(file), len))
    }

    /// List every entry currently in the store.
    ///
    /// A missing root yields an empty list. Entries that disappear between the
    /// directory read and the metadata lookup are skipped.
    pub async fn list_entries(&self) -> StorageResult<Vec<StoredEntry>> {
        let start = Instant::now();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "Entry vanished while listing");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to stat entry, skipping");
                    continue;
                }
            };

            let Some(created) = entry_timestamp(metadata.created(), metadata.modified()) else {
                tracing::warn!(path = %path.display(), "Entry has no usable timestamp, skipping");
                continue;
            };

            entries.push(StoredEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                created_at: DateTime::<Utc>::from(created),
                len: metadata.len(),
                is_file: metadata.is_file(),
            });
        }

        tracing::debug!(
            root = %self.root.display(),
            count = entries.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Store listed"
        );

        Ok(entries)
    }
}

/// Creation time where the filesystem records it, otherwise modification time.
fn entry_timestamp(
    created: std::io::Result<SystemTime>,
    modified: std::io::Result<SystemTime>,
) -> Option<SystemTime> {
    created.or(modified).ok()
}
