//! Engine settings.

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};
use crate::commands::cooldown::{DEFAULT_MAX_TRACKED_SENDERS, DEFAULT_SWEEP_INTERVAL_SECS};

/// Default slow-handler threshold in milliseconds.
pub const DEFAULT_SLOW_HANDLER_WARN_MS: u64 = 50;

/// All engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cooldown: CooldownSettings,
    pub dispatch: DispatchSettings,
    pub logging: LoggingSettings,
}

/// Cooldown bookkeeping limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownSettings {
    /// Seconds between sweeps of expired cooldown entries.
    pub sweep_interval_secs: u64,
    /// Maximum senders tracked at once. Zero disables the cap.
    pub max_tracked_senders: usize,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            max_tracked_senders: DEFAULT_MAX_TRACKED_SENDERS,
        }
    }
}

/// Dispatch behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Handlers running longer than this are reported. Zero disables it.
    pub slow_handler_warn_ms: u64,
    /// Tell the sender about unknown commands the fallback did not handle.
    pub notify_unknown_command: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            slow_handler_warn_ms: DEFAULT_SLOW_HANDLER_WARN_MS,
            notify_unknown_command: true,
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    /// Write logs to a daily rotating file instead of stderr.
    pub to_file: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: None,
            to_file: true,
        }
    }
}

impl Settings {
    /// Validate value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.cooldown.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cooldown.sweep_interval_secs must be at least 1".to_string(),
            ));
        }

        if let Some(filter) = &self.logging.filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "logging.filter cannot be blank".to_string(),
                ));
            }
        }

        Ok(())
    }
}
