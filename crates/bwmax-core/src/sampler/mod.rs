//! Throughput sampling.
//!
//! The aggregator turns the session byte counter into a rate series: once per
//! tick it diffs the counter against the previous tick, pushes the sample into
//! a rolling window, feeds the rate to the QoS guard and reports to the display.

mod ticker;
mod window;

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;

use crate::counter::ByteCounter;
use crate::events::{Event, EventSink};
use crate::qos::{QosGuard, QosTransition};

pub use ticker::spawn_ticker;
pub use window::{RollingWindow, ThroughputSample};

const MIB: f64 = 1024.0 * 1024.0;

/// Highest rate seen in the session. Reporting only; the guard never reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakRate {
    pub mbytes_per_sec: f64,
    pub mbits_per_sec: f64,
    /// Local wall-clock time (`HH:MM:SS`) when the Mbps peak was reached.
    pub mbits_at: Option<String>,
}

pub struct SampleAggregator {
    counter: Arc<ByteCounter>,
    guard: Arc<QosGuard>,
    events: EventSink,
    window: RollingWindow,
    last_total: u64,
    last_check: Instant,
    peak: PeakRate,
}

impl SampleAggregator {
    pub fn new(
        counter: Arc<ByteCounter>,
        guard: Arc<QosGuard>,
        events: EventSink,
        window_size: usize,
    ) -> Self {
        Self::new_at(counter, guard, events, window_size, Instant::now())
    }

    /// Like `new` with an explicit start instant for the first diff.
    pub fn new_at(
        counter: Arc<ByteCounter>,
        guard: Arc<QosGuard>,
        events: EventSink,
        window_size: usize,
        now: Instant,
    ) -> Self {
        let last_total = counter.total();
        Self {
            counter,
            guard,
            events,
            window: RollingWindow::new(window_size),
            last_total,
            last_check: now,
            peak: PeakRate::default(),
        }
    }

    pub fn tick(&mut self) -> Option<ThroughputSample> {
        self.tick_at(Instant::now())
    }

    /// Take one sample at `now`. Returns `None` (and changes nothing) when no
    /// time has passed since the previous tick.
    pub fn tick_at(&mut self, now: Instant) -> Option<ThroughputSample> {
        let time_diff = now.checked_duration_since(self.last_check)?;
        if time_diff.is_zero() {
            return None;
        }
        let total = self.counter.total();
        let bytes_diff = total.saturating_sub(self.last_total);
        let rate_mbytes = bytes_diff as f64 / time_diff.as_secs_f64() / MIB;
        let sample = ThroughputSample {
            at: now,
            rate_mbytes,
            rate_mbits: rate_mbytes * 8.0,
        };
        self.window.push(sample);
        self.last_total = total;
        self.last_check = now;

        if let (_, Some(QosTransition::Resumed)) = self.guard.poll_at(now) {
            self.events.emit(Event::QosResumed);
        }
        if let Some(QosTransition::Triggered { wait }) =
            self.guard.observe_at(sample.rate_mbits, now)
        {
            self.events.emit(Event::QosTriggered {
                wait_secs: wait.as_secs_f64(),
            });
        }

        self.record_peak(&sample);

        let avg_mbytes = self.window.average_mbytes();
        let total_mbytes = total as f64 / MIB;
        tracing::debug!(
            rate_mbytes = sample.rate_mbytes,
            rate_mbits = sample.rate_mbits,
            avg_mbytes,
            total_mbytes,
            "throughput sample"
        );
        self.events.emit(Event::SampleTick {
            rate_mbytes: sample.rate_mbytes,
            rate_mbits: sample.rate_mbits,
            avg_mbytes,
            total_mbytes,
        });
        Some(sample)
    }

    fn record_peak(&mut self, sample: &ThroughputSample) {
        if sample.rate_mbytes <= self.peak.mbytes_per_sec {
            return;
        }
        self.peak.mbytes_per_sec = sample.rate_mbytes;
        if sample.rate_mbits > self.peak.mbits_per_sec {
            self.peak.mbits_per_sec = sample.rate_mbits;
            self.peak.mbits_at = Some(Local::now().format("%H:%M:%S").to_string());
        }
        self.events.emit(Event::NewMaxSpeed {
            mbytes_per_sec: self.peak.mbytes_per_sec,
            mbits_per_sec: self.peak.mbits_per_sec,
        });
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn peak(&self) -> &PeakRate {
        &self.peak
    }
}
