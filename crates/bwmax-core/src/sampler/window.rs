//! Fixed-capacity window of recent throughput samples.

use std::collections::VecDeque;
use std::time::Instant;

/// One reading of the aggregator. Never modified after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    pub at: Instant,
    /// Mebibytes per second.
    pub rate_mbytes: f64,
    /// `rate_mbytes * 8`.
    pub rate_mbits: f64,
}

/// Oldest-first FIFO; pushing past capacity evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<ThroughputSample>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: ThroughputSample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThroughputSample> {
        self.samples.iter()
    }

    /// Mean MB/s over the window (0 when empty).
    pub fn average_mbytes(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.rate_mbytes).sum::<f64>() / self.samples.len() as f64
    }
}
