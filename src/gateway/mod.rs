//! Object-store gateway
//!
//! A narrow interface over the store's four multipart primitives:
//! begin / get-part-url / complete / abort. The gateway performs no
//! authorization (the access guard runs before it) and no retries; each
//! operation is a single round trip whose failure is surfaced as a typed
//! error.

use async_trait::async_trait;

use crate::error::{Result, UploadError};
use crate::protocol::CompletedPartEntry;

mod s3;

pub use s3::S3Gateway;

/// The four multipart primitives of the remote store
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    /// Start a multipart session for `object_key`, returning the store's
    /// opaque session token.
    async fn begin_upload(&self, object_key: &str, content_type: &str) -> Result<String>;

    /// Issue a single-use, time-limited PUT URL for one part.
    async fn part_upload_url(
        &self,
        object_key: &str,
        upload_id: &str,
        part_number: i32,
    ) -> Result<String>;

    /// Assemble the parts named by `manifest` into the final object,
    /// returning its location. The manifest must already be validated.
    async fn complete_upload(
        &self,
        object_key: &str,
        upload_id: &str,
        manifest: &[CompletedPartEntry],
    ) -> Result<String>;

    /// Abort the session, releasing any partially transferred bytes.
    async fn abort_upload(&self, object_key: &str, upload_id: &str) -> Result<()>;
}

/// Check the completion manifest against the store's contract: indices
/// 1..=N presented in ascending order, no gaps, no duplicates, each with a
/// non-empty digest.
pub fn validate_manifest(manifest: &[CompletedPartEntry]) -> Result<()> {
    if manifest.is_empty() {
        return Err(UploadError::ValidationError("manifest is empty".to_string()));
    }

    for (i, entry) in manifest.iter().enumerate() {
        let expected = (i + 1) as i32;
        if entry.part_number != expected {
            return Err(UploadError::ValidationError(format!(
                "part number {} at position {} (expected {})",
                entry.part_number, i, expected
            )));
        }
        if entry.etag.is_empty() {
            return Err(UploadError::ValidationError(format!(
                "part {} is missing its ETag",
                entry.part_number
            )));
        }
    }

    Ok(())
}
