//! Per-request error type and its classification for logging.

use std::fmt;

/// Failure of one GET. Always contained inside the worker that issued it.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, DNS, etc.).
    Curl(curl::Error),
    /// The server answered with a non-2xx status.
    Http(u32),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Http(_) => None,
        }
    }
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        FetchError::Curl(e)
    }
}

/// Coarse kind of a fetch failure. Only used to label log lines; every kind
/// gets the same fixed delay before the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Connect or read stalled past the timeout.
    Timeout,
    /// Network-level failure (refused, reset, DNS).
    Connection,
    /// Server answered with a non-success status.
    Http(u32),
    Other,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::Connection => write!(f, "connection"),
            FetchErrorKind::Http(code) => write!(f, "http {}", code),
            FetchErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> FetchErrorKind {
    if e.is_operation_timedout() {
        return FetchErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return FetchErrorKind::Connection;
    }
    FetchErrorKind::Other
}

pub fn classify(e: &FetchError) -> FetchErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Http(code) => FetchErrorKind::Http(*code),
    }
}
