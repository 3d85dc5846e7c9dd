use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter, Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

const LOG_FILE: &str = "geniusrise.log";

/// Directives for the log file when RUST_LOG is unset
const FILE_DIRECTIVES: &str = "geniusrise=info,geniusrise_core=info,geniusrise_spouts=info";

/// Directives for the terminal when RUST_LOG is unset
///
/// Results go to stdout and failures are printed on their own, so the
/// terminal only needs to hear about problems.
const STDERR_DIRECTIVES: &str = "warn";

/// Initialize logging for the genius CLI
///
/// Every run is recorded in a daily file (`geniusrise.log.YYYY-MM-DD`) under
/// the platform data dir, e.g. ~/.local/share/geniusrise/logs/. Dispatch runs
/// inside an `invocation` span carrying the spout, method and backend modes,
/// so each line of a run can be traced back to it; the span's close event
/// records how long the run took.
///
/// RUST_LOG, when set, applies to both the file and stderr,
/// e.g. `RUST_LOG=geniusrise_core=debug genius list`.
pub fn init() -> Result<()> {
    let log_dir = get_log_dir()?;

    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(file_filter(rust_log.as_deref())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .with_filter(stderr_filter(rust_log.as_deref())),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!("Logging initialized to {}", log_dir.display());

    Ok(())
}

/// Filter for the log file; an unparsable RUST_LOG falls back to the defaults
fn file_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(FILE_DIRECTIVES))
}

fn stderr_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(_) => file_filter(rust_log),
        None => EnvFilter::new(STDERR_DIRECTIVES),
    }
}

/// Get the log directory path using XDG conventions
fn get_log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("Failed to determine data directory (XDG_DATA_HOME or platform equivalent)")?;

    Ok(data_dir.join("geniusrise").join("logs"))
}
