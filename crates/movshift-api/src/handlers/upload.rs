use crate::constants::UPLOAD_FIELD;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use movshift_core::AppError;
use movshift_processing::ValidationError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
}

/// Stage the `video` part, convert it and return the name to download it under.
///
/// Parts with other names are skipped. The staged source is gone by the time
/// this returns, whatever the outcome.
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_video"))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or(ValidationError::MissingFile)?;

        let upload = state.stager.stage(&original_name, Box::pin(field)).await?;
        let output = state.coordinator.convert(upload).await?;

        let filename = output
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Internal("Output artifact has no file name".to_string()))?;

        tracing::info!(
            original = %original_name,
            filename = %filename,
            "Upload converted"
        );

        return Ok(Json(UploadResponse { filename }));
    }

    Err(ValidationError::MissingFile.into())
}
