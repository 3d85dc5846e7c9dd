use clap::Parser;
use geniusrise::app::{self, Cli};
use geniusrise_core::BackendRegistry;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = geniusrise::logging::init() {
        eprintln!("Warning: Failed to initialize logging: {:#}", e);
    }

    let cli = Cli::parse();
    let catalog = geniusrise_spouts::catalog();
    // No external state or output connectors are linked into this binary.
    let registry = BackendRegistry::default();

    match app::run(cli, &catalog, &registry).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
