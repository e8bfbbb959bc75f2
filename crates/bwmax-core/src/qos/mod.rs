//! QoS cooldown guard.
//!
//! Sustained throughput above a threshold is treated as a likely trigger for
//! upstream throttling. After `streak_length` consecutive over-threshold
//! samples the guard enters a cooldown during which workers stop issuing
//! requests. The cooldown expires on its own; nothing has to reset it.
//!
//! One guard exists per session. The sampler calls `observe` once per tick,
//! workers call `poll` before each fetch. All state sits behind a single
//! mutex, so every reader sees a whole transition or none of it.

mod state;

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

pub use state::{Gate, QosParams, QosPhase, QosState, QosTransition};

#[derive(Debug)]
pub struct QosGuard {
    params: QosParams,
    state: Mutex<QosState>,
}

impl QosGuard {
    pub fn new(params: QosParams) -> Self {
        Self {
            params,
            state: Mutex::new(QosState::default()),
        }
    }

    pub fn params(&self) -> &QosParams {
        &self.params
    }

    fn lock(&self) -> MutexGuard<'_, QosState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Feed the latest rate (megabits per second).
    pub fn observe(&self, rate_mbps: f64) -> Option<QosTransition> {
        self.observe_at(rate_mbps, Instant::now())
    }

    pub fn observe_at(&self, rate_mbps: f64, now: Instant) -> Option<QosTransition> {
        let transition = self.lock().observe(&self.params, rate_mbps, now);
        if let Some(QosTransition::Triggered { wait }) = transition {
            tracing::warn!(
                rate_mbps,
                threshold_mbps = self.params.threshold_mbps,
                wait_secs = wait.as_secs_f64(),
                "sustained throughput above threshold, cooling down"
            );
        }
        transition
    }

    /// Read-only gate check. An elapsed cooldown already counts as active here,
    /// even before `poll` has recorded the transition.
    pub fn is_active(&self) -> bool {
        self.is_active_at(Instant::now())
    }

    pub fn is_active_at(&self, now: Instant) -> bool {
        self.lock().is_active(&self.params, now)
    }

    /// Record cooldown expiry if due and return the worker gate. Exactly one
    /// caller observes `Some(QosTransition::Resumed)` per cooldown.
    pub fn poll(&self) -> (Gate, Option<QosTransition>) {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&self, now: Instant) -> (Gate, Option<QosTransition>) {
        let (gate, transition) = self.lock().poll(&self.params, now);
        if transition == Some(QosTransition::Resumed) {
            tracing::info!("cooldown complete, resuming downloads");
        }
        (gate, transition)
    }

    pub fn snapshot(&self) -> QosState {
        *self.lock()
    }
}

impl Default for QosGuard {
    fn default() -> Self {
        Self::new(QosParams::default())
    }
}

#[cfg(test)]
mod tests;
