//! Library half of the `genius` command.
//!
//! The binary only wires logging and the linked spout catalog into [`app::run`];
//! everything else lives here so integration tests can reach it.

pub mod app;
pub mod config;
pub mod logging;
pub mod parser;
