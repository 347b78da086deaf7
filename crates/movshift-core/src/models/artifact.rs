use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// An uploaded source file sitting in the staging store.
///
/// Owned by the transcode coordinator from staging until the conversion job
/// reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct UploadArtifact {
    pub path: PathBuf,
    pub original_name: String,
    pub created_at: DateTime<Utc>,
}

impl UploadArtifact {
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Base name of the staged file without its extension (`uploads/clip.mov` -> `clip`).
    ///
    /// Taken from the staged path, not the client-supplied name, so it is
    /// already sanitized.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// A converted file sitting in the output store, waiting for delivery or expiry.
#[derive(Debug, Clone, Serialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub ttl_deadline: DateTime<Utc>,
    /// Always `false` on the artifact a conversion returns. Delivery is
    /// recorded on disk: the file is renamed to a claim name, then deleted.
    pub delivered: bool,
}

impl OutputArtifact {
    pub fn new(path: impl Into<PathBuf>, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            path: path.into(),
            created_at,
            ttl_deadline: created_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            delivered: false,
        }
    }

    /// File name the artifact is addressed by on download.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.ttl_deadline
    }
}
