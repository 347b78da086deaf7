//! Movshift Core Library
//!
//! This crate provides the domain models, error types and configuration that are
//! shared across all movshift components: the staging and output artifacts, the
//! conversion job state machine, and the environment-driven converter settings.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, ConverterConfig, EncoderConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ConversionJob, InvalidTransition, JobProgress, JobState, OutputArtifact, UploadArtifact,
};
