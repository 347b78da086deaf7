//! Movshift Storage Library
//!
//! This crate provides the on-disk stores used by the converter: the staging
//! store for uploaded sources and the output store for converted artifacts.
//! Both are plain directories on the local filesystem.
//!
//! # Deletion
//!
//! Every deletion goes through [`remove_idempotent`]. Several independent actors
//! (delivery cleanup, retention timers, the periodic sweep) race to delete the
//! same files without any lock, so a file that is already gone is reported as
//! [`DeleteOutcome::AlreadyAbsent`], never as an error.
//!
//! # Names
//!
//! Entries are addressed by a single path component. Names must not be empty,
//! contain separators or `..`, or start with a dot; hidden names are reserved for
//! files the service manages internally.

pub mod delete;
pub mod error;
pub(crate) mod keys;
pub mod local;

// Re-export commonly used types
pub use delete::{remove_idempotent, DeleteOutcome};
pub use error::{StorageError, StorageResult};
pub use keys::validate_name;
pub use local::{LocalStore, StoredEntry};
