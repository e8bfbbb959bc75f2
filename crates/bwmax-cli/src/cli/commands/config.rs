//! `bwmax config` – print the effective configuration.

use anyhow::Result;
use bwmax_core::config::BwmaxConfig;
use std::path::Path;

pub fn show_config(cfg: &BwmaxConfig, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    if let Err(reason) = cfg.validate() {
        println!("# warning: {}", reason);
    }
    Ok(())
}
