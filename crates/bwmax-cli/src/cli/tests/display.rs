//! Tests for event display lines.

use crate::cli::commands::describe;
use bwmax_core::Event;

#[test]
fn describes_rates_with_both_units() {
    let line = describe(&Event::NewMaxSpeed {
        mbytes_per_sec: 3.337860107421875,
        mbits_per_sec: 26.702880859375,
    })
    .unwrap();
    assert_eq!(line, "new max speed: 3.34 MB/s (26.70 Mbps)");

    let line = describe(&Event::SampleTick {
        rate_mbytes: 1.0,
        rate_mbits: 8.0,
        avg_mbytes: 0.5,
        total_mbytes: 12.34,
    })
    .unwrap();
    assert_eq!(line, "1.00 MB/s (8.00 Mbps)  avg 0.50 MB/s  total 12.3 MB");
}

#[test]
fn describes_qos_transitions() {
    assert_eq!(
        describe(&Event::QosTriggered { wait_secs: 120.0 }).unwrap(),
        "sustained high speed detected, pausing downloads for 120s"
    );
    assert_eq!(
        describe(&Event::QosResumed).unwrap(),
        "QoS cooldown over, resuming downloads"
    );
}

#[test]
fn download_start_is_not_displayed() {
    assert!(describe(&Event::DownloadStarted {
        worker: 0,
        url: "http://h/x".to_string(),
    })
    .is_none());
}

#[test]
fn session_stop_without_samples() {
    let line = describe(&Event::SessionStopped {
        max_mbits_per_sec: 0.0,
        max_mbits_at: None,
    })
    .unwrap();
    assert_eq!(line, "session stopped; no throughput recorded");
}
