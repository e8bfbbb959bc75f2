//! Errors returned synchronously by `RunSession::start`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Requested worker count is outside `1..=max`. Nothing was spawned.
    #[error("connection count {requested} is outside 1..={max}")]
    InvalidConnectionCount { requested: usize, max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn {what} thread")]
    Spawn {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Reject counts outside `1..=max` before anything is spawned.
pub fn validate_connection_count(requested: usize, max: usize) -> Result<(), SessionError> {
    if requested == 0 || requested > max {
        return Err(SessionError::InvalidConnectionCount { requested, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_count_bounds() {
        assert!(validate_connection_count(1, 20).is_ok());
        assert!(validate_connection_count(20, 20).is_ok());
        assert!(matches!(
            validate_connection_count(0, 20),
            Err(SessionError::InvalidConnectionCount { requested: 0, max: 20 })
        ));
        let err = validate_connection_count(21, 20).unwrap_err();
        assert_eq!(err.to_string(), "connection count 21 is outside 1..=20");
    }
}
