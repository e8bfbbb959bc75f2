//! Typed events emitted by the core for an external display.
//!
//! Events travel over a bounded tokio mpsc channel. Producers are plain OS
//! threads, so they use `try_send`: a full or closed channel drops the event
//! and never blocks a worker or the ticker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// One observation for the display.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionStarted {
        connections: usize,
    },
    /// A worker received a success status and started streaming `url`.
    DownloadStarted {
        worker: usize,
        url: String,
    },
    /// Bytes read so far by the worker's current request. Sent at most once per
    /// tick interval while streaming, and once more when the request ends.
    BytesProgress {
        worker: usize,
        url: String,
        bytes: u64,
    },
    /// The per-request wall-clock cap was reached; the worker rotates to another URL.
    DownloadCapped {
        worker: usize,
        url: String,
    },
    TransportError {
        worker: usize,
        message: String,
    },
    /// The server answered with a non-success status.
    ServerStatus {
        worker: usize,
        code: u32,
    },
    QosTriggered {
        wait_secs: f64,
    },
    /// A worker is waiting on a cooling guard.
    QosCooling {
        remaining_secs: f64,
    },
    QosResumed,
    NewMaxSpeed {
        mbytes_per_sec: f64,
        mbits_per_sec: f64,
    },
    SampleTick {
        rate_mbytes: f64,
        rate_mbits: f64,
        avg_mbytes: f64,
        total_mbytes: f64,
    },
    SessionStopped {
        max_mbits_per_sec: f64,
        max_mbits_at: Option<String>,
    },
}

/// Cloneable, non-blocking producer side of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<Event>>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Sink backed by a bounded channel of `capacity` events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Some(tx),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Sink that discards everything.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fire-and-forget send.
    pub fn emit(&self, event: Event) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events lost to a full or closed channel.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
