//! Configuration schema for geniusrise
//!
//! Every field is optional so a partial (or empty) file is valid.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use geniusrise_core::ScanPolicy;
use geniusrise_core::backend::all_backend_parameters;

/// Main configuration structure for geniusrise
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GeniusriseConfig {
    /// Directory scanned for spout packages when `--spouts-dir` is not given
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spouts_dir: Option<PathBuf>,

    /// What discovery does with a package that fails to load
    #[serde(default)]
    pub scan_policy: ScanPolicySetting,

    /// Backend flag values used when the flag is not given on the command line
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanPolicySetting {
    #[default]
    Abort,
    Skip,
}

impl From<ScanPolicySetting> for ScanPolicy {
    fn from(setting: ScanPolicySetting) -> Self {
        match setting {
            ScanPolicySetting::Abort => ScanPolicy::Abort,
            ScanPolicySetting::Skip => ScanPolicy::SkipAndWarn,
        }
    }
}

fn scalar_to_flag(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(n) => Some(n.to_string()),
        toml::Value::Float(x) => Some(x.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

impl GeniusriseConfig {
    /// Validate the configuration for common errors
    ///
    /// Returns Ok(()) if valid, or Err with a list of error messages
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let known = all_backend_parameters();
        let mut errors = Vec::new();

        for (name, value) in &self.defaults {
            if known.get(name).is_none() {
                errors.push(format!(
                    "Unknown default '{}': not a backend flag (known: {})",
                    name,
                    known.names().join(", ")
                ));
            } else if scalar_to_flag(value).is_none() {
                errors.push(format!(
                    "Default '{}' must be a string, number or boolean",
                    name
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Defaults rendered as raw flag values
    pub fn default_flags(&self) -> IndexMap<String, String> {
        self.defaults
            .iter()
            .filter_map(|(name, value)| scalar_to_flag(value).map(|v| (name.clone(), v)))
            .collect()
    }
}
