//! Periodic thread that drives the aggregator.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::control::{panic_message, StopSignal};

use super::SampleAggregator;

/// Tick `aggregator` every `interval` until `stop` fires. The thread hands the
/// aggregator back on join so the session can read the peak rate.
pub fn spawn_ticker(
    mut aggregator: SampleAggregator,
    interval: Duration,
    stop: StopSignal,
) -> io::Result<JoinHandle<SampleAggregator>> {
    std::thread::Builder::new()
        .name("bwmax-ticker".to_string())
        .spawn(move || {
            let panicked = run_ticks(interval, &stop, || {
                aggregator.tick();
            });
            tracing::debug!(panicked, "ticker stopped");
            aggregator
        })
}

/// Call `tick` every `interval` until `stop` fires. A panicking tick is logged
/// and the loop keeps going; returns how many ticks panicked.
fn run_ticks<F: FnMut()>(interval: Duration, stop: &StopSignal, mut tick: F) -> usize {
    let mut panicked = 0;
    while !stop.wait_timeout(interval) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&mut tick)) {
            panicked += 1;
            tracing::error!("sampler tick panicked: {}", panic_message(payload.as_ref()));
        }
    }
    panicked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panicking_tick_does_not_end_the_loop() {
        let stop = StopSignal::new();
        let stopper = stop.clone();
        let mut calls = 0;
        let panicked = run_ticks(Duration::from_millis(1), &stop, || {
            calls += 1;
            if calls == 1 {
                panic!("bad sample");
            }
            if calls == 5 {
                stopper.stop();
            }
        });
        assert_eq!(panicked, 1);
        assert_eq!(calls, 5);
    }
}
