//! Logging initialization for sharevault.
//!
//! Vault events go to the console and to an append-only log file. Share
//! tokens never reach either sink in full: call sites log
//! [`redact`](crate::share::redact)ed prefixes, and sqlx statement logging
//! is held at `warn` so per-query output stays out of the file.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Result, VaultError};

/// Targets whose output is capped regardless of the configured level.
const QUIET_TARGETS: &[&str] = &["sqlx::query=warn"];

/// Parse a log level string; unknown values fall back to INFO.
fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter for the configured level. `RUST_LOG` directives still apply on
/// top of it.
fn build_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(parse_level(level).into());
    for target in QUIET_TARGETS {
        if let Ok(directive) = target.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Open `path` for appending, creating parent directories as needed.
fn open_log_file(path: &str) -> Result<fs::File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Initialize logging to stdout and the configured log file.
///
/// The file keeps history across restarts and carries no ANSI escapes.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let log_file = Arc::new(open_log_file(&config.file)?);

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(build_filter(&config.level))
        .try_init()
        .map_err(|e| VaultError::Config(format!("logging already initialized: {e}")))
}

/// Initialize console-only logging (for development).
pub fn init_console_only(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(build_filter(level))
        .try_init();
}
