//! Fixed-size pool of download worker threads.
//!
//! Each worker loops independently: ask the QoS guard for permission, stream
//! one randomly chosen candidate URL into the session byte counter, pause,
//! repeat. Workers are OS threads because each one blocks inside curl.

mod run;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::BwmaxConfig;
use crate::control::StopSignal;
use crate::counter::ByteCounter;
use crate::error::{validate_connection_count, SessionError};
use crate::events::EventSink;
use crate::fetch::FetchOptions;
use crate::qos::QosGuard;

/// Everything a worker shares with the rest of its session.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub urls: Arc<[String]>,
    pub opts: FetchOptions,
    pub inter_request_delay: Duration,
    pub counter: Arc<ByteCounter>,
    pub guard: Arc<QosGuard>,
    pub events: EventSink,
    pub stop: StopSignal,
}

impl WorkerContext {
    pub fn new(
        cfg: &BwmaxConfig,
        counter: Arc<ByteCounter>,
        guard: Arc<QosGuard>,
        events: EventSink,
        stop: StopSignal,
    ) -> Self {
        Self {
            urls: cfg.candidate_urls.clone().into(),
            opts: FetchOptions::from(cfg),
            inter_request_delay: cfg.inter_request_delay(),
            counter,
            guard,
            events,
            stop,
        }
    }
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stop: StopSignal,
}

impl WorkerPool {
    /// Spawn `connections` workers. Counts outside `1..=max_connections` are
    /// rejected before any thread starts. If a spawn fails, the workers already
    /// started are stopped and joined before the error is returned.
    pub fn start(
        connections: usize,
        max_connections: usize,
        ctx: WorkerContext,
    ) -> Result<Self, SessionError> {
        validate_connection_count(connections, max_connections)?;
        if ctx.urls.is_empty() {
            return Err(SessionError::InvalidConfig("candidate_urls is empty".to_string()));
        }

        let stop = ctx.stop.clone();
        let mut handles = Vec::with_capacity(connections);
        for id in 0..connections {
            let worker_ctx = ctx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("bwmax-worker-{}", id))
                .spawn(move || run::run_worker(id, worker_ctx));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    let partial = WorkerPool { handles, stop };
                    partial.stop();
                    partial.join();
                    return Err(SessionError::Spawn {
                        what: "worker",
                        source,
                    });
                }
            }
        }
        tracing::info!(connections, "worker pool started");
        Ok(Self { handles, stop })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Ask every worker to exit at its next checkpoint. Never blocks; idempotent.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for all workers to exit. Call after `stop`. Returns the number of
    /// workers that ended in a panic.
    pub fn join(self) -> usize {
        let mut panicked = 0;
        for handle in self.handles {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            tracing::warn!(panicked, "worker threads ended in a panic");
        }
        panicked
    }
}
