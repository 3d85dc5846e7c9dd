//! Configuration file I/O
//!
//! Loading always validates; a missing file yields the default config.

use super::paths::get_config_path;
use super::schema::GeniusriseConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load configuration from the default location
pub fn load_config() -> Result<GeniusriseConfig> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from `path`
///
/// Returns a default (empty) config if the file doesn't exist.
pub fn load_config_from(path: &Path) -> Result<GeniusriseConfig> {
    if !path.exists() {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(GeniusriseConfig::default());
    }

    let content =
        fs::read_to_string(path).context(format!("Failed to read config: {}", path.display()))?;

    let config: GeniusriseConfig =
        toml::from_str(&content).context(format!("Failed to parse config: {}", path.display()))?;

    if let Err(errors) = config.validate() {
        anyhow::bail!(
            "Config validation failed in {}:\n  {}",
            path.display(),
            errors.join("\n  ")
        );
    }

    Ok(config)
}
