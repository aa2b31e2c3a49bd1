//! Tracing subscriber setup for the `oas-mcp` binary.

use crate::config::{LoggingConfig, Mode};
use anyhow::Context as _;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. The stderr console layer is skipped in stdio
/// mode (stdout carries the protocol) and when disabled; the file layer appends JSON lines.
///
/// # Errors
///
/// Returns an error if the level is not a valid filter, the log file cannot be opened, or a
/// subscriber is already installed.
pub fn init(cfg: &LoggingConfig, mode: Mode) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .with_context(|| format!("invalid log level '{}'", cfg.level))?,
    };

    let console = (mode != Mode::Stdio && !cfg.disable_console).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let file = match &cfg.file {
        Some(path) => {
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(f)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
