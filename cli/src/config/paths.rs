//! Where geniusrise keeps its files.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the base geniusrise directory (~/.config/geniusrise/)
pub fn get_geniusrise_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Failed to get config directory")?
        .join("geniusrise"))
}

/// Get the config file path (~/.config/geniusrise/config.toml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_geniusrise_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_under_geniusrise_dir() {
        let base = get_geniusrise_dir().unwrap();
        assert!(base.ends_with("geniusrise"));
        assert_eq!(base.parent().unwrap(), dirs::config_dir().unwrap());
        assert_eq!(get_config_path().unwrap(), base.join("config.toml"));
    }
}
