//! `init-config` subcommand: write a default configuration file.

use super::config::{default_config_path, TurnstileConfig};
use std::path::PathBuf;

pub fn execute(path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.map(PathBuf::from).unwrap_or_else(default_config_path);
    if path.exists() {
        return Err(format!("Config file '{}' already exists", path.display()).into());
    }
    TurnstileConfig::create_default(&path)?;
    println!("Wrote default config to {}", path.display());
    println!("Edit it to set telegram.token_file and telegram.initial_owner, then run: turnstile run");
    Ok(())
}
