//! Client side of the multipart protocol
//!
//! Chunks a file, drives the four handshakes against the relay server, PUTs
//! part bytes directly to the store's presigned URLs, and aggregates
//! per-part progress.

pub mod chunker;
pub mod coordinator;
pub mod progress;
pub mod transport;

pub use chunker::{plan_parts, PartPlan, CHUNK_SIZE, MAX_PARTS};
pub use coordinator::{CancelHandle, UploadCoordinator, UploadOutcome, UploadPhase};
pub use progress::ProgressTracker;
pub use transport::{HttpPartTransport, HttpUploadApi, PartTransport, UploadApi};

use crate::error::Result;

/// Build a coordinator wired to a relay server over HTTP.
pub fn http_coordinator(
    base_url: impl Into<String>,
    upload_key: impl Into<String>,
) -> Result<UploadCoordinator<HttpUploadApi, HttpPartTransport>> {
    let api = HttpUploadApi::new(base_url, upload_key)?;
    let transport = HttpPartTransport::new()?;
    Ok(UploadCoordinator::new(api, transport))
}
