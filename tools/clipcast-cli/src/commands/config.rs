//! Print the effective configuration.

use std::path::PathBuf;

use clipcast_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, explicit: Option<PathBuf>, path_only: bool) -> anyhow::Result<()> {
    let location = explicit.unwrap_or_else(config_file_path);
    if path_only {
        println!("{}", location.display());
        return Ok(());
    }

    if !location.exists() {
        eprintln!("# {} not found, showing defaults", location.display());
    }
    config.validate()?;
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
