use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::UploadArtifact;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid job transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Shared, lock-free progress cell written by the encoder side channel.
#[derive(Debug, Clone, Default)]
pub struct JobProgress(Arc<AtomicU8>);

impl JobProgress {
    /// Record a progress sample. Values are clamped to 0..=100 and never move backwards.
    pub fn record(&self, percent: f32) {
        let value = percent.clamp(0.0, 100.0) as u8;
        self.0.fetch_max(value, Ordering::Relaxed);
    }

    pub fn percent(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }
}

/// One conversion request: `Pending -> Running -> Succeeded | Failed`.
///
/// Lives only in process memory for the duration of a single upload request.
#[derive(Debug)]
pub struct ConversionJob {
    pub id: Uuid,
    pub input: UploadArtifact,
    pub output_path: PathBuf,
    progress: JobProgress,
    state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(input: UploadArtifact, output_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
            output_path: output_path.into(),
            progress: JobProgress::default(),
            state: JobState::Pending,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn input_path(&self) -> &Path {
        &self.input.path
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress.percent()
    }

    pub fn progress(&self) -> JobProgress {
        self.progress.clone()
    }

    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Succeeded)?;
        self.progress.record(100.0);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Failed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: JobState) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (self.state, to),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        );
        if !allowed {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
