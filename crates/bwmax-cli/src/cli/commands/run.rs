//! `bwmax run` – start a session and print its events until Ctrl-C or `--duration`.

use anyhow::{Context, Result};
use bwmax_core::config::BwmaxConfig;
use bwmax_core::{Event, EventSink, RunSession, SessionReport};
use std::time::{Duration, Instant};

/// Cooling notices arrive from every waiting worker; print at most one per interval.
const COOLING_NOTICE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub connections: usize,
    pub duration: Option<f64>,
}

pub async fn run_session(cfg: BwmaxConfig, opts: RunOptions) -> Result<()> {
    let limit = opts
        .duration
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("--duration must be a non-negative number of seconds")?;

    let (events, mut rx) = EventSink::channel(cfg.event_buffer);
    let session = RunSession::start(&cfg, opts.connections, events)?;
    println!(
        "bwmax: {} connection(s) over {} URL(s); Ctrl-C to stop",
        session.connections(),
        cfg.candidate_urls.len()
    );

    // Ends once every sender is gone, i.e. after the session is joined.
    let display = tokio::spawn(async move {
        let mut last_cooling: Option<Instant> = None;
        while let Some(event) = rx.recv().await {
            match &event {
                Event::QosCooling { .. } => {
                    let now = Instant::now();
                    if last_cooling.is_some_and(|t| now.duration_since(t) < COOLING_NOTICE_INTERVAL) {
                        continue;
                    }
                    last_cooling = Some(now);
                }
                Event::QosResumed => last_cooling = None,
                _ => {}
            }
            if let Some(line) = describe(&event) {
                println!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), line);
            }
        }
    });

    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("listen for Ctrl-C")?;
            println!();
            tracing::info!("interrupted, stopping session");
        }
        _ = deadline => {
            tracing::info!("duration elapsed, stopping session");
        }
    }

    session.stop();
    let report = tokio::task::spawn_blocking(move || session.stop_and_join())
        .await
        .context("join session")?;
    if let Err(err) = display.await {
        tracing::warn!("event display task failed: {}", err);
    }
    print_report(&report);
    Ok(())
}

/// One display line for `event`, or `None` for events only worth logging.
pub(crate) fn describe(event: &Event) -> Option<String> {
    let line = match event {
        Event::SessionStarted { connections } => {
            format!("session started with {} worker(s)", connections)
        }
        Event::DownloadStarted { .. } => return None,
        Event::BytesProgress { worker, url, bytes } => format!(
            "worker {} read {:.2} MB from {}",
            worker,
            *bytes as f64 / 1_048_576.0,
            url
        ),
        Event::DownloadCapped { worker, url } => {
            format!("worker {} hit the per-request time cap on {}", worker, url)
        }
        Event::TransportError { worker, message } => {
            format!("worker {} transport error: {}", worker, message)
        }
        Event::ServerStatus { worker, code } => {
            format!("worker {} got HTTP {}", worker, code)
        }
        Event::QosTriggered { wait_secs } => format!(
            "sustained high speed detected, pausing downloads for {:.0}s",
            wait_secs
        ),
        Event::QosCooling { remaining_secs } => {
            format!("QoS cooldown, {:.0}s remaining", remaining_secs)
        }
        Event::QosResumed => "QoS cooldown over, resuming downloads".to_string(),
        Event::NewMaxSpeed {
            mbytes_per_sec,
            mbits_per_sec,
        } => format!(
            "new max speed: {:.2} MB/s ({:.2} Mbps)",
            mbytes_per_sec, mbits_per_sec
        ),
        Event::SampleTick {
            rate_mbytes,
            rate_mbits,
            avg_mbytes,
            total_mbytes,
        } => format!(
            "{:.2} MB/s ({:.2} Mbps)  avg {:.2} MB/s  total {:.1} MB",
            rate_mbytes, rate_mbits, avg_mbytes, total_mbytes
        ),
        Event::SessionStopped {
            max_mbits_per_sec,
            max_mbits_at,
        } => match max_mbits_at {
            Some(at) => format!(
                "session stopped; max speed {:.2} Mbps at {}",
                max_mbits_per_sec, at
            ),
            None => "session stopped; no throughput recorded".to_string(),
        },
    };
    Some(line)
}

fn print_report(report: &SessionReport) {
    println!("connections:   {}", report.connections);
    println!("elapsed:       {:.1}s", report.elapsed.as_secs_f64());
    println!("downloaded:    {:.1} MB", report.total_mbytes());
    println!("average:       {:.2} MB/s", report.average_mbytes());
    match &report.peak.mbits_at {
        Some(at) => println!(
            "max speed:     {:.2} MB/s ({:.2} Mbps) at {}",
            report.peak.mbytes_per_sec, report.peak.mbits_per_sec, at
        ),
        None => println!("max speed:     n/a"),
    }
    println!("qos cooldowns: {}", report.qos_triggers);
    if report.dropped_events > 0 {
        println!("(display skipped {} event(s))", report.dropped_events);
    }
}
