//! Body of one download worker.

use std::panic::{self, AssertUnwindSafe};

use curl::easy::Easy;
use rand::Rng;

use crate::control::panic_message;
use crate::events::Event;
use crate::fetch::{classify, fetch_once, FetchError, FetchOutcome};
use crate::qos::{Gate, QosTransition};

use super::WorkerContext;

/// What the loop does after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// A request was attempted; pause for the inter-request delay.
    Fetched,
    /// The guard was cooling and the worker already slept.
    Waited,
    Stopped,
}

/// Runs until the session stop signal fires. Nothing that happens inside an
/// iteration, including a panic, ends the loop early.
pub(super) fn run_worker(id: usize, ctx: WorkerContext) {
    let mut easy = Easy::new();
    tracing::debug!(worker = id, "worker started");

    while !ctx.stop.is_stopped() {
        let step = panic::catch_unwind(AssertUnwindSafe(|| iteration(id, &ctx, &mut easy)));
        let step = match step {
            Ok(step) => step,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(worker = id, "worker iteration panicked: {}", message);
                ctx.events.emit(Event::TransportError {
                    worker: id,
                    message: format!("unexpected failure: {}", message),
                });
                // The handle may be mid-transfer; start clean.
                easy = Easy::new();
                Step::Fetched
            }
        };
        match step {
            Step::Stopped => break,
            Step::Waited => {}
            Step::Fetched => {
                if ctx.stop.wait_timeout(ctx.inter_request_delay) {
                    break;
                }
            }
        }
    }

    tracing::debug!(worker = id, "worker stopped");
}

fn iteration(id: usize, ctx: &WorkerContext, easy: &mut Easy) -> Step {
    match ctx.guard.poll() {
        (Gate::Wait { wait, remaining }, _) => {
            tracing::debug!(
                worker = id,
                remaining_secs = remaining.as_secs_f64(),
                "QoS cooldown in progress"
            );
            ctx.events.emit(Event::QosCooling {
                remaining_secs: remaining.as_secs_f64(),
            });
            return if ctx.stop.wait_timeout(wait) {
                Step::Stopped
            } else {
                Step::Waited
            };
        }
        (Gate::Proceed, Some(QosTransition::Resumed)) => ctx.events.emit(Event::QosResumed),
        (Gate::Proceed, _) => {}
    }

    let url = pick_url(&ctx.urls);
    tracing::debug!(worker = id, url, "requesting");
    let result = fetch_once(
        easy,
        url,
        &ctx.opts,
        &ctx.counter,
        &ctx.stop,
        || {
            ctx.events.emit(Event::DownloadStarted {
                worker: id,
                url: url.to_string(),
            })
        },
        |bytes| {
            ctx.events.emit(Event::BytesProgress {
                worker: id,
                url: url.to_string(),
                bytes,
            })
        },
    );

    match result {
        Ok(outcome) => {
            let bytes = outcome.bytes();
            match outcome {
                FetchOutcome::Completed { .. } => {
                    tracing::debug!(worker = id, url, bytes, "download completed");
                }
                FetchOutcome::Capped { .. } => {
                    tracing::info!(worker = id, url, bytes, "max download time reached, rotating");
                    ctx.events.emit(Event::DownloadCapped {
                        worker: id,
                        url: url.to_string(),
                    });
                }
                FetchOutcome::Stopped { .. } => {
                    tracing::debug!(worker = id, url, bytes, "download interrupted by stop");
                }
            }
            ctx.events.emit(Event::BytesProgress {
                worker: id,
                url: url.to_string(),
                bytes,
            });
            if matches!(outcome, FetchOutcome::Stopped { .. }) {
                return Step::Stopped;
            }
        }
        Err(e) => {
            let kind = classify(&e);
            tracing::warn!(worker = id, url, %kind, "request failed: {}", e);
            match &e {
                FetchError::Http(code) => ctx.events.emit(Event::ServerStatus {
                    worker: id,
                    code: *code,
                }),
                FetchError::Curl(_) => ctx.events.emit(Event::TransportError {
                    worker: id,
                    message: e.to_string(),
                }),
            }
        }
    }
    Step::Fetched
}

fn pick_url(urls: &[String]) -> &str {
    let index = rand::rng().random_range(0..urls.len());
    &urls[index]
}
