//! Tracing setup. Log lines go to a file under the XDG state dir so they never
//! interleave with the live throughput display; stderr is the fallback.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,bwmax=debug,bwmax_core=debug";

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    File(PathBuf),
    Stderr,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `~/.local/state/bwmax/bwmax.log`
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bwmax")?;
    Ok(xdg_dirs.get_state_home().join("bwmax.log"))
}

/// Install the global subscriber writing to the state log file. Errors if the
/// file cannot be opened or a subscriber is already installed.
pub fn init_logging() -> Result<LogDestination> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;

    // Worker and ticker threads are named, so thread names identify the source.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_thread_names(true)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!("bwmax logging to {}", path.display());
    Ok(LogDestination::File(path))
}

/// Stderr-only subscriber for when `init_logging` fails. A no-op if one is
/// already installed.
pub fn init_logging_stderr() -> LogDestination {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
    LogDestination::Stderr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lives_under_bwmax_state_dir() {
        let path = log_file_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "bwmax.log");
    }
}
