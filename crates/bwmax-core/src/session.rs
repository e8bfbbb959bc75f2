//! One start/stop cycle of the bandwidth run.
//!
//! A `RunSession` owns everything that lives for one run: the byte counter,
//! the QoS guard, the worker threads and the ticker thread. Nothing is global,
//! so a new session always starts from a zero counter, an active guard and
//! fresh curl handles (no keep-alive state carries over from a previous run).

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::BwmaxConfig;
use crate::control::StopSignal;
use crate::counter::ByteCounter;
use crate::error::{validate_connection_count, SessionError};
use crate::events::{Event, EventSink};
use crate::qos::{QosGuard, QosParams};
use crate::sampler::{spawn_ticker, PeakRate, SampleAggregator};
use crate::worker::{WorkerContext, WorkerPool};

/// Summary returned when a session is stopped.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub connections: usize,
    pub total_bytes: u64,
    pub elapsed: Duration,
    pub peak: PeakRate,
    pub qos_triggers: u32,
    pub dropped_events: u64,
}

impl SessionReport {
    pub fn total_mbytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Mean rate over the whole session in MB/s.
    pub fn average_mbytes(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total_mbytes() / secs
    }
}

pub struct RunSession {
    connections: usize,
    counter: Arc<ByteCounter>,
    guard: Arc<QosGuard>,
    stop: StopSignal,
    events: EventSink,
    pool: Option<WorkerPool>,
    ticker: Option<JoinHandle<SampleAggregator>>,
    started_at: Instant,
}

impl RunSession {
    /// Validate, then spawn `connections` workers and the sampling ticker.
    /// On error nothing keeps running.
    pub fn start(
        cfg: &BwmaxConfig,
        connections: usize,
        events: EventSink,
    ) -> Result<Self, SessionError> {
        validate_connection_count(connections, cfg.max_connections)?;
        cfg.validate().map_err(SessionError::InvalidConfig)?;

        tracing::info!(connections, "session starting");
        events.emit(Event::SessionStarted { connections });

        let counter = Arc::new(ByteCounter::new());
        let guard = Arc::new(QosGuard::new(QosParams::from(&cfg.qos)));
        let stop = StopSignal::new();

        let ctx = WorkerContext::new(
            cfg,
            Arc::clone(&counter),
            Arc::clone(&guard),
            events.clone(),
            stop.clone(),
        );
        let pool = WorkerPool::start(connections, cfg.max_connections, ctx)
            .map_err(|e| abandon_start(&events, e))?;

        let aggregator = SampleAggregator::new(
            Arc::clone(&counter),
            Arc::clone(&guard),
            events.clone(),
            cfg.rolling_window_size,
        );
        let ticker = match spawn_ticker(aggregator, cfg.tick_interval(), stop.clone()) {
            Ok(handle) => handle,
            Err(source) => {
                pool.stop();
                pool.join();
                return Err(abandon_start(
                    &events,
                    SessionError::Spawn {
                        what: "ticker",
                        source,
                    },
                ));
            }
        };

        Ok(Self {
            connections,
            counter,
            guard,
            stop,
            events,
            pool: Some(pool),
            ticker: Some(ticker),
            started_at: Instant::now(),
        })
    }

    pub fn connections(&self) -> usize {
        self.connections
    }

    pub fn total_bytes(&self) -> u64 {
        self.counter.total()
    }

    pub fn guard(&self) -> &QosGuard {
        &self.guard
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Signal workers and the ticker to exit. Never blocks; idempotent.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stop, wait for every thread, and report. Workers notice the stop within
    /// one chunk, one progress callback, or one guard wait.
    pub fn stop_and_join(mut self) -> SessionReport {
        self.stop();
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
        let peak = match self.ticker.take().map(JoinHandle::join) {
            Some(Ok(aggregator)) => aggregator.peak().clone(),
            Some(Err(_)) => {
                tracing::warn!("ticker thread panicked");
                PeakRate::default()
            }
            None => PeakRate::default(),
        };

        let report = SessionReport {
            connections: self.connections,
            total_bytes: self.counter.total(),
            elapsed: self.started_at.elapsed(),
            peak,
            qos_triggers: self.guard.snapshot().triggers,
            dropped_events: self.events.dropped(),
        };
        tracing::info!(
            total_bytes = report.total_bytes,
            elapsed_secs = report.elapsed.as_secs_f64(),
            max_mbits = report.peak.mbits_per_sec,
            qos_triggers = report.qos_triggers,
            "session stopped"
        );
        self.events.emit(Event::SessionStopped {
            max_mbits_per_sec: report.peak.mbits_per_sec,
            max_mbits_at: report.peak.mbits_at.clone(),
        });
        report
    }
}

/// Close out a `SessionStarted` that was already emitted when startup fails
/// partway, so consumers always see the pair.
fn abandon_start(events: &EventSink, err: SessionError) -> SessionError {
    tracing::error!("session failed to start: {}", err);
    events.emit(Event::SessionStopped {
        max_mbits_per_sec: 0.0,
        max_mbits_at: None,
    });
    err
}

impl Drop for RunSession {
    fn drop(&mut self) {
        // Detached threads still exit at their next checkpoint.
        self.stop.stop();
    }
}
