//! Image upload handlers

use crate::api::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use civic_lifecycle::validate_image;
use civic_types::ImageAttachment;

/// Store an uploaded image; the body is the raw file, typed by `content-type`.
pub async fn upload_attachment(
    State(state): State<AppState>,
    caller: CurrentUser,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ImageAttachment>)> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("content-type header is required".to_string()))?;

    let candidate = ImageAttachment {
        reference: "upload".to_string(),
        mime_type: mime_type.clone(),
        size_bytes: body.len() as u64,
    };
    validate_image(&candidate, state.engine.config())
        .map_err(|failure| ApiError::Validation(failure.to_string()))?;

    let stored = state.attachments.put_attachment(&mime_type, body.to_vec()).await?;
    tracing::info!(
        reference = %stored.reference,
        size_bytes = stored.size_bytes,
        uploader = %caller.0.id,
        "Stored attachment"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(reference): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let not_found = || ApiError::NotFound(format!("Attachment {} not found", reference));
    let meta = state
        .attachments
        .get_attachment(&reference)
        .await?
        .ok_or_else(not_found)?;
    let bytes = state
        .attachments
        .read_attachment(&reference)
        .await?
        .ok_or_else(not_found)?;
    Ok(([(header::CONTENT_TYPE, meta.mime_type)], bytes))
}
