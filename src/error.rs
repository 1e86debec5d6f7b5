//! Error types for the Portage upload relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::protocol::FailureResponse;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload protocol error taxonomy
///
/// Every gateway failure is surfaced as one of these; nothing is silently
/// swallowed. A single failure at any stage forces the terminal abort path.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Malformed or missing required fields, caught before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown/expired upload session, or the store rejected the session
    #[error("Session error: {0}")]
    SessionError(String),

    /// Completion manifest violates the store's completion contract
    #[error("Invalid completion manifest: {0}")]
    ValidationError(String),

    /// A part PUT failed or timed out
    #[error("Part transfer failed: {0}")]
    TransferError(String),

    /// Shared-secret mismatch
    #[error("Invalid key")]
    AuthError,
}

impl UploadError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::SessionError(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::TransferError(_) => StatusCode::BAD_GATEWAY,
            Self::AuthError => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(FailureResponse {
            status: false,
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UploadError::TransferError(format!("Request timed out: {}", e))
        } else {
            UploadError::TransferError(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            UploadError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(UploadError::AuthError.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            UploadError::TransferError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
