//! Configuration management for the dispatch engine.
//!
//! This module handles loading and validating engine settings from a TOML
//! file. A missing file is not an error; defaults are used instead.

mod settings;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use settings::{CooldownSettings, DispatchSettings, LoggingSettings, Settings};

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// The configuration file could not be read.
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration file is not valid TOML or has wrong types.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Get the default configuration file path.
///
/// - Linux: `~/.config/commandeer/config.toml`
/// - macOS: `~/Library/Application Support/commandeer/config.toml`
/// - Windows: `C:\Users\<User>\AppData\Roaming\commandeer\config.toml`
pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("commandeer").join(CONFIG_FILE_NAME))
}

impl Settings {
    /// Load settings from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;

        debug!(path = %path.display(), "Loaded configuration");
        Ok(settings)
    }

    /// Load settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }
}
