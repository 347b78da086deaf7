use movshift_core::Config;
use std::path::Path;

const MAX_FILENAME_LENGTH: usize = 255;

/// Validation errors for uploaded source files
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Only {} files are allowed", .allowed.to_uppercase())]
    MissingExtension { filename: String, allowed: String },

    #[error("Only {} files are allowed", .allowed.to_uppercase())]
    InvalidExtension { extension: String, allowed: String },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    EmptyFile,
}

impl ValidationError {
    /// Whether the error is about the upload size rather than its name or type.
    pub fn is_size_error(&self) -> bool {
        matches!(self, ValidationError::FileTooLarge { .. })
    }
}

/// Validator for uploaded source videos
///
/// Only one source container is accepted. The extension check runs on the
/// client-supplied name before any byte is written; the size check runs while
/// the body is streamed.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: u64,
    source_extension: String,
}

impl UploadValidator {
    pub fn new(max_file_size: u64, source_extension: impl Into<String>) -> Self {
        Self {
            max_file_size,
            source_extension: source_extension.into().to_lowercase(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_upload_size_bytes(), config.source_extension())
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// Validate the file extension (case-insensitive) and return it lowercased.
    pub fn validate_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::MissingExtension {
                filename: filename.to_string(),
                allowed: self.source_extension.clone(),
            })?;

        if extension != self.source_extension {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.source_extension.clone(),
            });
        }

        Ok(extension)
    }

    /// Validate a byte count seen so far. Called repeatedly while streaming.
    pub fn validate_running_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate the final size of a fully received upload.
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        self.validate_running_size(size)
    }

    /// Name under which an upload is staged: `<sanitized stem>.<source extension>`.
    ///
    /// The extension is always the configured one in lowercase, so swapping it
    /// for the target extension and back is exact.
    pub fn staged_file_name(&self, original_name: &str) -> Result<String, ValidationError> {
        self.validate_extension(original_name)?;

        let base = original_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(original_name);
        let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);

        let stem = sanitize_filename(stem)
            .map_err(|_| ValidationError::InvalidFilename(original_name.to_string()))?;
        let stem = stem.trim_end_matches('.');
        if stem.is_empty() {
            return Err(ValidationError::InvalidFilename(original_name.to_string()));
        }

        Ok(format!("{}.{}", stem, self.source_extension))
    }
}

/// Reduce a client-supplied filename to a single safe path component.
///
/// Directory components (either separator) are dropped, anything other than
/// alphanumerics, `.`, `-` and `_` becomes `_`, runs of dots collapse to one
/// and leading dots are removed.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(sanitized.len());
    for c in sanitized.chars() {
        if c == '.' && collapsed.ends_with('.') {
            continue;
        }
        collapsed.push(c);
    }

    let sanitized = collapsed.trim_start_matches('.').to_string();
    if sanitized.is_empty() {
        return Err(ValidationError::InvalidFilename(filename.to_string()));
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> UploadValidator {
        UploadValidator::new(1024 * 1024, "mov")
    }

    #[test]
    fn test_validate_extension_ok() {
        let validator = test_validator();
        assert_eq!(validator.validate_extension("clip.mov").unwrap(), "mov");
        assert_eq!(validator.validate_extension("CLIP.MOV").unwrap(), "mov");
    }

    #[test]
    fn test_validate_extension_rejects_other_containers() {
        let validator = test_validator();
        let err = validator.validate_extension("clip.txt").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension { .. }));
        assert_eq!(err.to_string(), "Only MOV files are allowed");
    }

    #[test]
    fn test_validate_extension_requires_extension() {
        let validator = test_validator();
        let err = validator.validate_extension("clip").unwrap_err();
        assert!(matches!(err, ValidationError::MissingExtension { .. }));
        assert_eq!(err.to_string(), "Only MOV files are allowed");
    }

    #[test]
    fn test_validate_file_size() {
        let validator = test_validator();
        assert!(validator.validate_file_size(512 * 1024).is_ok());
        assert!(matches!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
        let err = validator.validate_file_size(2 * 1024 * 1024).unwrap_err();
        assert!(err.is_size_error());
    }

    #[test]
    fn test_running_size_allows_zero_so_far() {
        let validator = test_validator();
        assert!(validator.validate_running_size(0).is_ok());
        assert!(validator.validate_running_size(1024 * 1024).is_ok());
        assert!(validator.validate_running_size(1024 * 1024 + 1).is_err());
    }

    #[test]
    fn test_staged_file_name_lowercases_extension() {
        let validator = test_validator();
        assert_eq!(validator.staged_file_name("clip.mov").unwrap(), "clip.mov");
        assert_eq!(validator.staged_file_name("Clip.MOV").unwrap(), "Clip.mov");
        assert_eq!(
            validator.staged_file_name("holiday 2024.mov").unwrap(),
            "holiday_2024.mov"
        );
    }

    #[test]
    fn test_staged_file_name_strips_directories() {
        let validator = test_validator();
        assert_eq!(
            validator.staged_file_name("/tmp/videos/clip.mov").unwrap(),
            "clip.mov"
        );
        assert_eq!(
            validator.staged_file_name("C:\\videos\\clip.mov").unwrap(),
            "clip.mov"
        );
    }

    #[test]
    fn test_staged_file_name_keeps_inner_double_dots() {
        let validator = test_validator();
        assert_eq!(
            validator.staged_file_name("clip..final.mov").unwrap(),
            "clip.final.mov"
        );
        assert_eq!(
            validator.staged_file_name("../../clip.mov").unwrap(),
            "clip.mov"
        );
    }

    #[test]
    fn test_staged_file_name_rejects_bare_extension() {
        let validator = test_validator();
        assert!(validator.staged_file_name(".mov").is_err());
        assert!(validator.staged_file_name("...mov").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip.mov").unwrap(), "clip.mov");
        assert_eq!(sanitize_filename("my-file_1.mov").unwrap(), "my-file_1.mov");
        assert_eq!(sanitize_filename(".hidden.mov").unwrap(), "hidden.mov");
        assert_eq!(sanitize_filename("a..b.mov").unwrap(), "a.b.mov");
        assert_eq!(sanitize_filename("../clip.mov").unwrap(), "clip.mov");
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("dir/").is_err());
    }
}
