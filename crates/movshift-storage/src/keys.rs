//! Entry name validation shared by both stores.

use crate::{StorageError, StorageResult};

const MAX_NAME_LENGTH: usize = 255;

/// Validate that `name` addresses exactly one visible entry inside a store root.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(StorageError::InvalidName(format!(
            "name exceeds {} bytes",
            MAX_NAME_LENGTH
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(StorageError::InvalidName(format!(
            "'{}' contains a path separator",
            name
        )));
    }
    if name.contains("..") || name.starts_with('.') {
        return Err(StorageError::InvalidName(format!(
            "'{}' is not a plain file name",
            name
        )));
    }
    Ok(())
}
