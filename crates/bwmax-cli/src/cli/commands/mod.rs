//! CLI command handlers.

mod config;
mod run;

pub use config::show_config;
pub use run::{run_session, RunOptions};

#[cfg(test)]
pub(crate) use run::describe;
