//! Top-level `genius` command: discovery, listing and per-spout dispatch.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use geniusrise_core::{
    BackendRegistry, Catalog, ComponentDescriptor, Discoverer, Dispatcher, ParameterSchema,
    ScanPolicy, ScanResult,
};

use crate::config::{self, GeniusriseConfig};
use crate::parser::build_parser;

#[derive(Parser, Debug)]
#[command(name = "genius")]
#[command(about = "Discover spouts and run their methods from the command line", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory scanned for spout packages (default: config `spouts_dir`, then `.`)
    #[arg(long, global = true)]
    pub spouts_dir: Option<PathBuf>,

    /// Skip packages that fail to load instead of aborting
    #[arg(long, global = true)]
    pub skip_broken_packages: bool,

    /// Configuration file (default: the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List discovered spouts with their constructor flags and methods
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// `<SpoutName> rise ...` or `<SpoutName> help`
    #[command(external_subcommand)]
    Spout(Vec<String>),
}

#[derive(Serialize)]
struct ListedSpout<'a> {
    name: &'a str,
    package: &'a Path,
    parameters: &'a ParameterSchema,
    methods: Vec<&'static str>,
}

/// Run the command, returning the process exit code.
pub async fn run(cli: Cli, catalog: &Catalog, registry: &BackendRegistry) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => {
            anyhow::ensure!(path.exists(), "Config file not found: {}", path.display());
            config::load_config_from(path)?
        }
        None => config::load_config()?,
    };

    let scan = discover(&cli, &config, catalog)?;
    for warning in &scan.warnings {
        eprintln!("warning: skipped package {warning}");
    }

    match cli.command {
        Command::List { json } => {
            list(&scan, json)?;
            Ok(0)
        }
        Command::Spout(argv) => run_spout(&scan, &config, registry, argv).await,
    }
}

fn discover(cli: &Cli, config: &GeniusriseConfig, catalog: &Catalog) -> Result<ScanResult> {
    let root = cli
        .spouts_dir
        .clone()
        .or_else(|| config.spouts_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let policy = if cli.skip_broken_packages {
        ScanPolicy::SkipAndWarn
    } else {
        config.scan_policy.into()
    };

    tracing::debug!(root = %root.display(), ?policy, "scanning for spouts");
    Discoverer::new(catalog)
        .with_policy(policy)
        .scan(&root)
        .with_context(|| format!("Failed to discover spouts under {}", root.display()))
}

fn list(scan: &ScanResult, json: bool) -> Result<()> {
    if json {
        let listed: Vec<_> = scan
            .components
            .values()
            .map(|d| ListedSpout {
                name: &d.name,
                package: &d.package,
                parameters: &d.init_schema,
                methods: d.methods().iter().map(|m| m.name).collect(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if scan.components.is_empty() {
        println!("No spouts found");
        return Ok(());
    }
    for descriptor in scan.components.values() {
        println!("{}{}", descriptor.name, descriptor.init_schema);
        println!("  package: {}", descriptor.package.display());
        let methods: Vec<_> = descriptor.methods().iter().map(|m| m.name).collect();
        println!("  methods: {}", methods.join(", "));
    }
    Ok(())
}

async fn run_spout(
    scan: &ScanResult,
    config: &GeniusriseConfig,
    registry: &BackendRegistry,
    argv: Vec<String>,
) -> Result<i32> {
    let name = argv.first().cloned().unwrap_or_default();
    let Some(descriptor) = scan.get(&name) else {
        let known: Vec<_> = scan.components.keys().map(String::as_str).collect();
        anyhow::bail!(
            "Unknown spout '{}'. Discovered spouts: {}",
            name,
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            }
        );
    };

    let parser = match build_parser(descriptor) {
        Ok(parser) => parser,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(2);
        }
    };
    let matches = match parser.command.clone().try_get_matches_from(&argv) {
        Ok(matches) => matches,
        Err(e) => {
            let code = e.exit_code();
            e.print()?;
            return Ok(code);
        }
    };

    match matches.subcommand() {
        Some(("rise", rise)) => {
            let request = match parser.request(rise, &config.default_flags()) {
                Ok(request) => request,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return Ok(2);
                }
            };
            let outcome = Dispatcher::new(descriptor, registry).run(request).await;
            match &outcome.result {
                Ok(serde_json::Value::Null) => {}
                Ok(value) => println!("{}", serde_json::to_string_pretty(value)?),
                Err(e) => eprintln!("Error: {e}"),
            }
            Ok(outcome.exit_code())
        }
        _ => {
            print_help(descriptor);
            Ok(0)
        }
    }
}

fn print_help(descriptor: &ComponentDescriptor) {
    println!("{}{}", descriptor.name, descriptor.init_schema);
    println!();
    println!("Methods:");
    for method in descriptor.methods() {
        println!("  {}({})", method.name, method.params.join(", "));
        if !method.doc.is_empty() {
            println!("      {}", method.doc);
        }
    }
    println!();
    println!(
        "Usage: {} rise <output_mode> <state_mode> <method_name> [flags] [--args TOKEN...]",
        descriptor.name
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("genius").chain(args.iter().copied()))
    }

    #[test]
    fn test_spout_name_is_an_external_subcommand() {
        let parsed = cli(&["--spouts-dir", "/srv", "TestSpoutCtlSpout", "rise", "batch", "none", "m"]);
        assert_eq!(parsed.spouts_dir, Some(PathBuf::from("/srv")));
        match parsed.command {
            Command::Spout(argv) => assert_eq!(argv[0], "TestSpoutCtlSpout"),
            other => panic!("expected spout subcommand, got {other:?}"),
        }
    }

    #[test]
    fn test_discover_prefers_flag_over_config() {
        let flagged = TempDir::new().unwrap();
        std::fs::write(
            flagged.path().join("package.toml"),
            r#"exports = ["TestSpoutCtlSpout"]"#,
        )
        .unwrap();
        let configured = TempDir::new().unwrap();

        let config = GeniusriseConfig {
            spouts_dir: Some(configured.path().to_path_buf()),
            ..Default::default()
        };
        let catalog = geniusrise_spouts::catalog();

        let flag = flagged.path().to_str().unwrap();
        let scan = discover(&cli(&["--spouts-dir", flag, "list"]), &config, &catalog).unwrap();
        assert!(scan.get("TestSpoutCtlSpout").is_some());

        let scan = discover(&cli(&["list"]), &config, &catalog).unwrap();
        assert!(scan.components.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_spout_is_an_error() {
        let dir = TempDir::new().unwrap();
        let catalog = geniusrise_spouts::catalog();
        let path = dir.path().to_str().unwrap();
        let err = run(
            cli(&["--spouts-dir", path, "--config", path, "Nope", "help"]),
            &catalog,
            &BackendRegistry::default(),
        )
        .await;
        // a directory is not a readable config file
        assert!(err.is_err());

        let config = dir.path().join("config.toml");
        std::fs::write(&config, "").unwrap();
        let err = run(
            cli(&["--spouts-dir", path, "--config", config.to_str().unwrap(), "Nope", "help"]),
            &catalog,
            &BackendRegistry::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Unknown spout 'Nope'"));
    }
}
