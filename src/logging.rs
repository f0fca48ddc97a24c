//! Logging configuration using the tracing ecosystem.
//!
//! This module configures structured logging with:
//! - File-based output with daily rotation, or stderr for interactive use
//! - Environment-based log level configuration
//! - A configurable fallback filter

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::config::LoggingSettings;

/// Default log level if neither RUST_LOG nor the settings provide one.
const DEFAULT_LOG_FILTER: &str = "commandeer=info,warn";

/// Initialize the logging system.
///
/// `RUST_LOG` wins over `settings.filter`, which wins over the built-in
/// default. Logs go to a daily rotating file in the local data directory
/// when `settings.to_file` is set and `force_stderr` is not.
///
/// # Log Directory
///
/// - Linux: `~/.local/share/commandeer/logs/`
/// - macOS: `~/Library/Application Support/commandeer/logs/`
/// - Windows: `C:\Users\<User>\AppData\Local\commandeer\logs\`
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already set.
pub fn init(settings: &LoggingSettings, force_stderr: bool) -> anyhow::Result<()> {
    let filter = build_filter(settings.filter.as_deref());

    if settings.to_file && !force_stderr {
        let log_dir = get_log_directory()?;
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "commandeer.log");

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
        tracing::debug!(log_dir = %log_dir.display(), "Log directory");
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Commandeer starting up");
    Ok(())
}

fn build_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Get the log directory path.
fn get_log_directory() -> anyhow::Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(base_dir.join("commandeer").join("logs"))
}

/// Get the path where logs are stored, for showing to users.
pub fn log_directory() -> Option<PathBuf> {
    get_log_directory().ok()
}

/// Log engine shutdown.
pub fn shutdown() {
    tracing::info!("Commandeer shutting down");
}
