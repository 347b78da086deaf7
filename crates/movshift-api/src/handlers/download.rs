use crate::constants::content_type_for;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Response, StatusCode},
};
use movshift_core::AppError;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;

/// RFC 5987 `attr-char` minus alphanumerics: everything else is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment` disposition with an ASCII fallback and the exact UTF-8 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(file_name, ATTR_CHAR)
    )
}

/// Stream a converted artifact once. The artifact and its staging counterpart
/// are deleted when the response body finishes or is dropped.
#[tracing::instrument(skip(state), fields(operation = "download_video"))]
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response<Body>, HttpAppError> {
    let delivery = state.delivery.deliver(&filename).await?;

    let content_type = content_type_for(&delivery.file_name);
    let disposition = content_disposition(&delivery.file_name);
    let content_length = delivery.content_length;
    let (stream, _done) = delivery.into_parts();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("clip.mp4"),
            "attachment; filename=\"clip.mp4\"; filename*=UTF-8''clip.mp4"
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let header = content_disposition("vidéo.mp4");
        assert!(header.contains("filename=\"vid_o.mp4\""));
        assert!(header.contains("filename*=UTF-8''vid%C3%A9o.mp4"));
    }
}
