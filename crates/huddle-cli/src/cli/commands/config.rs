//! Config command handlers.

use anyhow::{Context, Result};
use huddle_core::config;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

/// Prints the loaded configuration with the base URL override applied.
pub fn show(config: &config::Config) -> Result<()> {
    let mut effective = config.clone();
    effective.base_url = config.effective_base_url()?;
    let toml = toml::to_string_pretty(&effective).context("serialize config")?;
    print!("{toml}");
    Ok(())
}
