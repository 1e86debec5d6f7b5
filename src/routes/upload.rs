//! Upload protocol routes
//!
//! The four handshakes of the multipart protocol, each a thin translation
//! between the wire shape and one gateway primitive:
//! - POST /api/upload/id - begin a session, returns the store's upload id
//! - POST /api/upload/url - presign one part's transfer URL
//! - POST /api/upload/location - assemble the parts, returns the object location
//! - POST /api/upload/abort - abort the session
//!
//! All four sit behind the `x-pass` access guard.

use axum::{extract::State, middleware, routing::post, Json, Router};

use crate::auth::require_upload_key;
use crate::error::{Result, UploadError};
use crate::gateway::validate_manifest;
use crate::protocol::{
    AbortUploadRequest, AbortUploadResponse, BeginUploadRequest, BeginUploadResponse,
    CompleteUploadRequest, CompleteUploadResponse, PartUrlRequest, PartUrlResponse,
};
use crate::state::AppState;

/// Create the upload router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload/id", post(begin_upload))
        .route("/api/upload/url", post(part_url))
        .route("/api/upload/location", post(complete_upload))
        .route("/api/upload/abort", post(abort_upload))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_upload_key,
        ))
        .with_state(state)
}

/// POST /api/upload/id
///
/// Begin a multipart session for `<folder>/<fileName>`.
async fn begin_upload(
    State(state): State<AppState>,
    Json(request): Json<BeginUploadRequest>,
) -> Result<Json<BeginUploadResponse>> {
    if request.file_name.is_empty() {
        return Err(UploadError::InvalidInput("fileName is required".to_string()));
    }
    if request.file_type.is_empty() {
        return Err(UploadError::InvalidInput("fileType is required".to_string()));
    }

    let object_key = state.config().object_key(&request.file_name);
    let upload_id = state
        .gateway()
        .begin_upload(&object_key, &request.file_type)
        .await?;

    tracing::info!(
        file_name = %request.file_name,
        upload_id = %upload_id,
        "Issued upload session"
    );

    Ok(Json(BeginUploadResponse {
        status: true,
        upload_id,
    }))
}

/// POST /api/upload/url
///
/// Presign the transfer URL for one part of an open session.
async fn part_url(
    State(state): State<AppState>,
    Json(request): Json<PartUrlRequest>,
) -> Result<Json<PartUrlResponse>> {
    if request.file_name.is_empty() || request.upload_id.is_empty() {
        return Err(UploadError::InvalidInput(
            "fileName and uploadId are required".to_string(),
        ));
    }

    let object_key = state.config().object_key(&request.file_name);
    let upload_url = state
        .gateway()
        .part_upload_url(&object_key, &request.upload_id, request.part_number)
        .await?;

    tracing::debug!(
        file_name = %request.file_name,
        upload_id = %request.upload_id,
        part_number = request.part_number,
        "Issued part transfer URL"
    );

    Ok(Json(PartUrlResponse {
        status: true,
        upload_url,
    }))
}

/// POST /api/upload/location
///
/// Validate the completion manifest and assemble the object.
async fn complete_upload(
    State(state): State<AppState>,
    Json(request): Json<CompleteUploadRequest>,
) -> Result<Json<CompleteUploadResponse>> {
    if request.file_name.is_empty() || request.upload_id.is_empty() {
        return Err(UploadError::InvalidInput(
            "fileName and uploadId are required".to_string(),
        ));
    }

    // Reject malformed manifests before touching the store
    validate_manifest(&request.parts)?;

    let object_key = state.config().object_key(&request.file_name);
    let location = state
        .gateway()
        .complete_upload(&object_key, &request.upload_id, &request.parts)
        .await?;

    tracing::info!(
        file_name = %request.file_name,
        upload_id = %request.upload_id,
        parts = request.parts.len(),
        "Upload completed"
    );

    Ok(Json(CompleteUploadResponse {
        status: true,
        location,
    }))
}

/// POST /api/upload/abort
///
/// Abort the session and release any partially transferred bytes.
async fn abort_upload(
    State(state): State<AppState>,
    Json(request): Json<AbortUploadRequest>,
) -> Result<Json<AbortUploadResponse>> {
    if request.file_name.is_empty() || request.upload_id.is_empty() {
        return Err(UploadError::InvalidInput(
            "fileName and uploadId are required".to_string(),
        ));
    }

    let object_key = state.config().object_key(&request.file_name);
    state
        .gateway()
        .abort_upload(&object_key, &request.upload_id)
        .await?;

    tracing::info!(
        file_name = %request.file_name,
        upload_id = %request.upload_id,
        "Upload aborted"
    );

    Ok(Json(AbortUploadResponse { status: true }))
}
