//! QoS state and its transitions, free of locking.

use std::time::{Duration, Instant};

use crate::config::{QosConfig, StreakDecay};

/// Tuning for the guard, resolved from `QosConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QosParams {
    pub threshold_mbps: f64,
    pub streak_length: u32,
    pub cooldown: Duration,
    pub check_interval: Duration,
    pub streak_decay: StreakDecay,
}

impl Default for QosParams {
    fn default() -> Self {
        Self::from(&QosConfig::default())
    }
}

impl From<&QosConfig> for QosParams {
    fn from(cfg: &QosConfig) -> Self {
        Self {
            threshold_mbps: cfg.threshold_mbps,
            streak_length: cfg.streak_length.max(1),
            cooldown: cfg.cooldown(),
            check_interval: cfg.check_interval(),
            streak_decay: cfg.streak_decay,
        }
    }
}

/// Whether workers may download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosPhase {
    Active,
    Cooling { started_at: Instant },
}

/// A state change reported to the caller so it can emit the matching event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QosTransition {
    Triggered { wait: Duration },
    Resumed,
}

/// What a worker should do before its next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    /// Sleep for `wait`, then ask again. `remaining` is the cooldown left.
    Wait { wait: Duration, remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosState {
    pub phase: QosPhase,
    /// Consecutive over-threshold samples seen while active.
    pub above_threshold_streak: u32,
    /// Cooldowns started during this session.
    pub triggers: u32,
}

impl Default for QosState {
    fn default() -> Self {
        Self {
            phase: QosPhase::Active,
            above_threshold_streak: 0,
            triggers: 0,
        }
    }
}

impl QosState {
    /// Cooldown time left at `now`; `None` while active.
    pub fn remaining(&self, params: &QosParams, now: Instant) -> Option<Duration> {
        match self.phase {
            QosPhase::Active => None,
            QosPhase::Cooling { started_at } => {
                let elapsed = now.saturating_duration_since(started_at);
                Some(params.cooldown.saturating_sub(elapsed))
            }
        }
    }

    /// True when workers may run at `now`, counting an elapsed cooldown as over.
    pub fn is_active(&self, params: &QosParams, now: Instant) -> bool {
        match self.remaining(params, now) {
            None => true,
            Some(rest) => rest.is_zero(),
        }
    }

    /// Feed one rate sample. Samples that arrive while cooling are ignored.
    pub(crate) fn observe(
        &mut self,
        params: &QosParams,
        rate_mbps: f64,
        now: Instant,
    ) -> Option<QosTransition> {
        if self.phase != QosPhase::Active {
            return None;
        }
        if rate_mbps > params.threshold_mbps {
            self.above_threshold_streak = self.above_threshold_streak.saturating_add(1);
            if self.above_threshold_streak >= params.streak_length {
                self.phase = QosPhase::Cooling { started_at: now };
                self.above_threshold_streak = 0;
                self.triggers = self.triggers.saturating_add(1);
                return Some(QosTransition::Triggered {
                    wait: params.cooldown,
                });
            }
        } else {
            self.above_threshold_streak = match params.streak_decay {
                StreakDecay::Reset => 0,
                StreakDecay::Decrement => self.above_threshold_streak.saturating_sub(1),
            };
        }
        None
    }

    /// Evaluate cooldown expiry and tell the caller whether to fetch or wait.
    pub(crate) fn poll(&mut self, params: &QosParams, now: Instant) -> (Gate, Option<QosTransition>) {
        let Some(rest) = self.remaining(params, now) else {
            return (Gate::Proceed, None);
        };
        if rest.is_zero() {
            self.phase = QosPhase::Active;
            self.above_threshold_streak = 0;
            return (Gate::Proceed, Some(QosTransition::Resumed));
        }
        (
            Gate::Wait {
                wait: rest.min(params.check_interval),
                remaining: rest,
            },
            None,
        )
    }
}
