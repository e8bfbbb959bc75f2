//! Session-wide byte counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Total bytes received since the session started. Only ever grows.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicU64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one received chunk. Returns the new total.
    pub fn add(&self, bytes: u64) -> u64 {
        self.total.fetch_add(bytes, Ordering::AcqRel) + bytes
    }

    /// Single atomic snapshot of the total.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}
