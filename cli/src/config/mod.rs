//! Configuration for the `genius` command
//!
//! - `schema` - Configuration data structures
//! - `io` - Reading and validating config files
//! - `paths` - Directory path management
//!
//! ```toml
//! # ~/.config/geniusrise/config.toml
//! spouts_dir = "/srv/spouts"
//! scan_policy = "skip"
//!
//! [defaults]
//! redis_host = "localhost"
//! output_folder = "/var/lib/geniusrise/out"
//! ```

pub mod io;
pub mod paths;
pub mod schema;

pub use io::{load_config, load_config_from};
pub use paths::{get_config_path, get_geniusrise_dir};
pub use schema::{GeniusriseConfig, ScanPolicySetting};
