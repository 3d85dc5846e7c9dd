//! Common test utilities and fixtures
//!
//! This module provides shared test helpers for genius CLI tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a temporary directory for test fixtures
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Path to the checked-in spout packages
pub fn fixture_spouts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("spouts")
}

/// A `genius` command whose config, data and home dirs live in `home`
///
/// Keeps the user's real config and log files out of the test run.
pub fn genius(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("genius").expect("genius binary should build");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG");
    cmd
}

/// A `genius` command already pointed at the fixture spouts
pub fn genius_with_fixtures(home: &Path) -> Command {
    let mut cmd = genius(home);
    cmd.arg("--spouts-dir").arg(fixture_spouts_dir());
    cmd
}

/// Writes a config file and returns its path
pub fn create_test_config(dir: &Path, content: &str) -> std::io::Result<PathBuf> {
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, content)?;
    Ok(config_path)
}

/// Creates a package directory exporting `exports` under `root`
pub fn create_package(root: &Path, name: &str, exports: &[&str]) -> std::io::Result<PathBuf> {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir)?;
    let quoted: Vec<String> = exports.iter().map(|e| format!("\"{e}\"")).collect();
    std::fs::write(
        dir.join("package.toml"),
        format!("name = \"{name}\"\nexports = [{}]\n", quoted.join(", ")),
    )?;
    Ok(dir)
}
