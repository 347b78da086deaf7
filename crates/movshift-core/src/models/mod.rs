mod artifact;
mod job;

pub use artifact::{OutputArtifact, UploadArtifact};
pub use job::{ConversionJob, InvalidTransition, JobProgress, JobState};
