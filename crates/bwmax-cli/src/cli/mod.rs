//! CLI for bwmax.

mod commands;

use anyhow::Result;
use bwmax_core::config::{self, BwmaxConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use commands::{run_session, show_config, RunOptions};

/// Top-level CLI for bwmax.
#[derive(Debug, Parser)]
#[command(name = "bwmax")]
#[command(about = "bwmax: keep a link saturated with parallel downloads, backing off on sustained peaks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Start download workers and report throughput until Ctrl-C.
    Run {
        /// Number of concurrent download workers (default from config).
        #[arg(short = 'c', long, value_name = "N")]
        connections: Option<usize>,
        /// Stop automatically after this many seconds.
        #[arg(long, value_name = "SECS")]
        duration: Option<f64>,
        /// Read configuration from this file instead of the default location.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Download from this URL (repeatable). Replaces the configured list.
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,
    },

    /// Print the effective configuration and where it is stored.
    Config {
        /// Read configuration from this file instead of the default location.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                connections,
                duration,
                config,
                urls,
            } => {
                let mut cfg = load_config(config.as_deref())?;
                tracing::debug!("loaded config: {:?}", cfg);
                if !urls.is_empty() {
                    cfg.candidate_urls = urls;
                }
                let opts = RunOptions {
                    connections: connections.unwrap_or(cfg.default_connections),
                    duration,
                };
                run_session(cfg, opts).await?;
            }
            CliCommand::Config { config } => {
                let cfg = load_config(config.as_deref())?;
                let path = match config {
                    Some(path) => path,
                    None => config::config_path()?,
                };
                show_config(&cfg, &path)?;
            }
        }

        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<BwmaxConfig> {
    match path {
        Some(path) => config::load_from_path(path),
        None => config::load_or_init(),
    }
}

#[cfg(test)]
mod tests;
