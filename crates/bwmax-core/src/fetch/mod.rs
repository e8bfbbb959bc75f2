//! One bounded streaming GET whose body is counted and discarded.
//!
//! Each worker owns a curl `Easy` handle for the lifetime of its session so
//! keep-alive connections are reused between requests and closed when the
//! session ends. A request ends when the body completes, when the wall-clock
//! cap is reached, when the session stops, or on error. Stop and the cap are
//! checked on every chunk and on curl's progress callback, which also fires
//! while the transfer is stalled.

mod error;

use std::cell::Cell;
use std::time::{Duration, Instant};

use curl::easy::{Easy, List};

use crate::config::BwmaxConfig;
use crate::control::StopSignal;
use crate::counter::ByteCounter;

pub use error::{classify, classify_curl_error, FetchError, FetchErrorKind};

/// Transfer settings shared by all workers of a session.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub chunk_size: usize,
    /// Connect timeout, and the stall window before a read is abandoned.
    pub timeout: Duration,
    /// Hard wall-clock cap per request.
    pub max_duration: Duration,
    pub insecure_tls: bool,
    /// Preformatted `Name: value` header lines.
    pub headers: Vec<String>,
    /// Minimum spacing of mid-transfer progress reports.
    pub progress_interval: Duration,
}

impl From<&BwmaxConfig> for FetchOptions {
    fn from(cfg: &BwmaxConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size_bytes,
            timeout: cfg.request_timeout(),
            max_duration: cfg.max_download(),
            insecure_tls: cfg.insecure_tls,
            headers: cfg
                .headers
                .iter()
                .map(|(k, v)| format!("{}: {}", k.trim(), v.trim()))
                .collect(),
            progress_interval: cfg.tick_interval(),
        }
    }
}

/// How a request without a transport or status error ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The whole body was read.
    Completed { bytes: u64 },
    /// The wall-clock cap was reached; not an error.
    Capped { bytes: u64 },
    /// The session stop signal fired mid-transfer.
    Stopped { bytes: u64 },
}

impl FetchOutcome {
    pub fn bytes(&self) -> u64 {
        match *self {
            FetchOutcome::Completed { bytes }
            | FetchOutcome::Capped { bytes }
            | FetchOutcome::Stopped { bytes } => bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    Stopped,
    Capped,
    Status,
}

/// Parse the status code from an HTTP status line (`HTTP/1.1 200 OK`, `HTTP/2 404`).
pub fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

fn configure(easy: &mut Easy, url: &str, opts: &FetchOptions) -> Result<(), curl::Error> {
    easy.reset();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.noproxy("*")?;
    easy.buffer_size(opts.chunk_size)?;
    easy.connect_timeout(opts.timeout)?;
    // Read timeout: abort when fewer than 1 byte/s arrives for `timeout`.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(opts.timeout)?;
    // Backstop only; the progress callback enforces the cap first.
    easy.timeout(opts.max_duration.saturating_add(opts.timeout))?;
    easy.progress(true)?;
    if opts.insecure_tls {
        easy.ssl_verify_peer(false)?;
        easy.ssl_verify_host(false)?;
    }
    if !opts.headers.is_empty() {
        let mut list = List::new();
        for line in &opts.headers {
            list.append(line)?;
        }
        easy.http_headers(list)?;
    }
    Ok(())
}

/// Stream `url` once, adding every body chunk of a 2xx response to `counter`.
/// `on_start` runs once, when the first body chunk of a success response arrives.
/// `on_progress` gets the bytes read so far at most once per `progress_interval`.
pub fn fetch_once<F, P>(
    easy: &mut Easy,
    url: &str,
    opts: &FetchOptions,
    counter: &ByteCounter,
    stop: &StopSignal,
    on_start: F,
    mut on_progress: P,
) -> Result<FetchOutcome, FetchError>
where
    F: FnOnce(),
    P: FnMut(u64),
{
    configure(easy, url, opts)?;

    let started = Instant::now();
    let max_duration = opts.max_duration;
    let status = Cell::new(0u32);
    let abort: Cell<Option<Abort>> = Cell::new(None);
    let bytes = Cell::new(0u64);
    let mut on_start = Some(on_start);
    let mut last_report = started;

    let check_limits = || {
        if stop.is_stopped() {
            abort.set(Some(Abort::Stopped));
            return false;
        }
        if started.elapsed() >= max_duration {
            abort.set(Some(Abort::Capped));
            return false;
        }
        true
    };

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(code) = parse_status_line(line) {
                status.set(code);
            }
            true
        })?;
        transfer.write_function(|data| {
            if !check_limits() {
                return Ok(0);
            }
            match status.get() {
                200..=299 => {}
                // Redirect bodies are skipped; curl follows the Location.
                300..=399 => return Ok(data.len()),
                _ => {
                    abort.set(Some(Abort::Status));
                    return Ok(0);
                }
            }
            if let Some(f) = on_start.take() {
                f();
            }
            let len = data.len() as u64;
            counter.add(len);
            bytes.set(bytes.get() + len);
            if last_report.elapsed() >= opts.progress_interval {
                last_report = Instant::now();
                on_progress(bytes.get());
            }
            Ok(data.len())
        })?;
        transfer.progress_function(|_, _, _, _| check_limits())?;
        transfer.perform()
    };

    let bytes = bytes.get();
    match perform_result {
        Ok(()) => {
            let code = easy.response_code()?;
            if !(200..300).contains(&code) {
                return Err(FetchError::Http(code));
            }
            Ok(FetchOutcome::Completed { bytes })
        }
        Err(e) => match abort.get() {
            Some(Abort::Stopped) => Ok(FetchOutcome::Stopped { bytes }),
            Some(Abort::Capped) => Ok(FetchOutcome::Capped { bytes }),
            Some(Abort::Status) => Err(FetchError::Http(status.get())),
            None if e.is_operation_timedout() && started.elapsed() >= max_duration => {
                Ok(FetchOutcome::Capped { bytes })
            }
            None => Err(FetchError::Curl(e)),
        },
    }
}
