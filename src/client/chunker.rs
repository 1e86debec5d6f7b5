//! File chunking
//!
//! Splits a file's byte length into the fixed-size part ranges the protocol
//! transfers independently. Pure and deterministic; the same length always
//! yields the same plan.

use crate::error::{Result, UploadError};

/// Fixed part size: 25 MB
pub const CHUNK_SIZE: u64 = 25 * 1_000_000;

/// S3 caps a multipart upload at 10,000 parts
pub const MAX_PARTS: u64 = 10_000;

/// One planned part: a contiguous byte range of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    /// 1-based part index
    pub part_number: i32,

    /// Inclusive start offset
    pub start: u64,

    /// Exclusive end offset
    pub end: u64,
}

impl PartPlan {
    /// Length of this part in bytes
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Plan the parts covering `[0, total_len)` with no gaps and no overlaps.
///
/// The final part ends exactly at `total_len` even when shorter than
/// [`CHUNK_SIZE`]. A zero-length file cannot be chunked, and a file
/// needing more than [`MAX_PARTS`] parts is rejected here, before any
/// session is opened.
pub fn plan_parts(total_len: u64) -> Result<Vec<PartPlan>> {
    if total_len == 0 {
        return Err(UploadError::InvalidInput(
            "Cannot upload an empty file".to_string(),
        ));
    }

    let count = total_len.div_ceil(CHUNK_SIZE);
    if count > MAX_PARTS {
        return Err(UploadError::InvalidInput(format!(
            "File needs {} parts, exceeding the {}-part limit",
            count, MAX_PARTS
        )));
    }
    let parts = (0..count)
        .map(|i| {
            let start = i * CHUNK_SIZE;
            PartPlan {
                part_number: (i + 1) as i32,
                start,
                end: (start + CHUNK_SIZE).min(total_len),
            }
        })
        .collect();

    Ok(parts)
}
