//! Progress aggregation
//!
//! One atomic byte counter per part, written by that part's transfer task
//! and read by anyone polling the overall percentage. Counters only ever
//! grow, so the reported percentage is monotonically non-decreasing over
//! the life of one upload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

struct PartProgress {
    size: u64,
    sent: AtomicU64,
}

/// Aggregates per-part transfer counters into one overall percentage
#[derive(Default)]
pub struct ProgressTracker {
    parts: OnceLock<Vec<PartProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the part sizes once the chunk plan is known.
    ///
    /// Before this is called, `percent()` reports 0.
    pub fn init_parts(&self, sizes: &[u64]) {
        let _ = self.parts.set(
            sizes
                .iter()
                .map(|&size| PartProgress {
                    size,
                    sent: AtomicU64::new(0),
                })
                .collect(),
        );
    }

    /// Record `delta` more bytes sent for the 1-based `part_number`.
    pub fn add_bytes(&self, part_number: i32, delta: u64) {
        if let Some(parts) = self.parts.get() {
            if let Some(part) = parts.get((part_number - 1) as usize) {
                part.sent.fetch_add(delta, Ordering::Relaxed);
            }
        }
    }

    /// Mark a part fully transferred.
    pub fn mark_complete(&self, part_number: i32) {
        if let Some(parts) = self.parts.get() {
            if let Some(part) = parts.get((part_number - 1) as usize) {
                part.sent.fetch_max(part.size, Ordering::Relaxed);
            }
        }
    }

    /// Unweighted average of per-part completion, rounded to an integer
    /// percentage in `[0, 100]`.
    pub fn percent(&self) -> u8 {
        let Some(parts) = self.parts.get() else {
            return 0;
        };
        if parts.is_empty() {
            return 0;
        }

        let total: f64 = parts
            .iter()
            .map(|part| {
                let sent = part.sent.load(Ordering::Relaxed).min(part.size);
                sent as f64 / part.size as f64
            })
            .sum();

        ((total / parts.len() as f64) * 100.0).round() as u8
    }
}
