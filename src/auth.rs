//! Access guard
//!
//! Every protocol endpoint requires the `x-pass` header to match the
//! configured shared secret. A missing or wrong key is answered with the
//! wire failure shape before any store-side call is made.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::UploadError;
use crate::state::AppState;

/// Header carrying the shared secret
pub const PASS_HEADER: &str = "x-pass";

/// Middleware rejecting requests without the correct `x-pass` header
pub async fn require_upload_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(PASS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == state.config().upload.upload_key)
        .unwrap_or(false);

    if authorized {
        next.run(request).await
    } else {
        tracing::warn!("Rejected request with missing or invalid upload key");
        UploadError::AuthError.into_response()
    }
}
