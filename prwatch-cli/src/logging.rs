//! Tracing setup: console plus an append-only log file

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::Context;
use prwatch_core::config::{LogLevel, LogSettings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` wins over the configured level; `--verbose` raises it to debug
fn filter(level: LogLevel, verbose: bool) -> EnvFilter {
    let level = if verbose { LogLevel::Debug } else { level };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Console-only logging for short-lived subcommands
pub fn init_console(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(LogLevel::Info, verbose))
        .try_init();
}

/// Console and file logging for the long-running monitor
pub fn init(settings: &LogSettings, verbose: bool) -> anyhow::Result<()> {
    if let Some(parent) = settings.file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create log directory")?;
        }
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.file)
        .with_context(|| format!("Failed to open log file {}", settings.file.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(fmt::layer().with_writer(Arc::new(log_file)).with_ansi(false))
        .with(filter(settings.level, verbose))
        .try_init()
        .context("Failed to initialize logging")?;

    tracing::info!(
        level = %settings.level,
        file = %settings.file.display(),
        "Logging initialized"
    );
    Ok(())
}
