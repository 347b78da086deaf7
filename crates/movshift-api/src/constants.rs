//! API constants

/// Multipart field that carries the uploaded video.
pub const UPLOAD_FIELD: &str = "video";

/// Allowance on top of the upload size limit for multipart framing.
///
/// The exact per-file limit is enforced while the part is streamed; this only
/// bounds the raw request body.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Liveness and readiness probe paths (never prefixed).
pub const HEALTH_PATH: &str = "/health";
pub const READY_PATH: &str = "/health/ready";

/// Content type for a delivered artifact, by file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
