//! Movshift API Library
//!
//! This crate provides the HTTP handlers, application state and setup for the
//! converter service.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
