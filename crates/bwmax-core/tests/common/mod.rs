#![allow(dead_code)]

pub mod test_server;

use std::time::{Duration, Instant};

use bwmax_core::config::BwmaxConfig;
use bwmax_core::Event;

/// Config with short timings suited to tests.
pub fn fast_config(urls: Vec<String>) -> BwmaxConfig {
    let mut cfg = BwmaxConfig::default();
    cfg.candidate_urls = urls;
    cfg.request_timeout_secs = 2.0;
    cfg.max_download_secs = 10.0;
    cfg.inter_request_delay_secs = 0.01;
    cfg.tick_interval_secs = 0.1;
    cfg.event_buffer = 50_000;
    cfg
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
