//! Wire types for the multipart upload protocol
//!
//! Shared between the server routes and the client transport so both sides
//! agree on the JSON shape. Every response carries a `status` flag; failures
//! additionally carry a human-readable `message`.

use serde::{Deserialize, Serialize};

/// POST /api/upload/id request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginUploadRequest {
    /// Display name of the file (already carrying the uniqueness prefix)
    pub file_name: String,

    /// MIME type of the file
    pub file_type: String,
}

/// POST /api/upload/id response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginUploadResponse {
    pub status: bool,

    /// Opaque session token issued by the store
    pub upload_id: String,
}

/// POST /api/upload/url request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlRequest {
    pub file_name: String,

    /// 1-based part index
    pub part_number: i32,

    pub upload_id: String,
}

/// POST /api/upload/url response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlResponse {
    pub status: bool,

    /// Single-use, time-limited URL permitting one PUT of the part's bytes
    pub upload_url: String,
}

/// One entry of the completion manifest, in the store's native field casing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPartEntry {
    /// Content tag the store returned when the part bytes were received
    #[serde(rename = "ETag")]
    pub etag: String,

    /// 1-based part index
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
}

/// POST /api/upload/location request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub file_name: String,

    /// Manifest entries, required in ascending part order with no gaps
    pub parts: Vec<CompletedPartEntry>,

    pub upload_id: String,
}

/// POST /api/upload/location response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub status: bool,

    /// Final URL of the assembled object
    pub location: String,
}

/// POST /api/upload/abort request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortUploadRequest {
    pub file_name: String,
    pub upload_id: String,
}

/// POST /api/upload/abort response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortUploadResponse {
    pub status: bool,
}

/// Failure body shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub status: bool,
    pub message: String,
}
