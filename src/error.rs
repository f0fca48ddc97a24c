//! Centralized error types for the engine.
//!
//! Dispatch itself never fails towards the host. These errors cover the
//! places where something can go wrong before dispatch starts: loading
//! configuration and registering handlers.

use thiserror::Error;

use crate::commands::{RegistrationError, RegistrationReport};
use crate::config::ConfigError;

/// The main engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A single registration entry failed.
    #[error("{0}")]
    Registration(#[from] RegistrationError),

    /// A provider registered only some of its entries.
    #[error("{owner}: {} of its entries failed to register", failures.len())]
    PartialRegistration {
        owner: String,
        failures: Vec<RegistrationError>,
    },

    /// IO errors (console input, log files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with a message.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        EngineError::Other(msg.into())
    }

    /// Get a user-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Config(e) => match e {
                ConfigError::NoConfigDir => {
                    "Could not find configuration directory. Pass --config explicitly.".to_string()
                }
                ConfigError::ReadError(_) => {
                    "Could not read configuration file. Please check it is readable.".to_string()
                }
                ConfigError::ParseError(_) => {
                    "Configuration file is invalid. Please check the file format.".to_string()
                }
                ConfigError::ValidationError(msg) => format!("Configuration error: {}", msg),
            },
            EngineError::Registration(e) => format!("Command registration failed: {}", e),
            EngineError::PartialRegistration { owner, failures } => {
                let details: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
                format!(
                    "Some commands of {} could not be registered: {}",
                    owner,
                    details.join("; ")
                )
            }
            EngineError::Io(_) => "An input or output operation failed.".to_string(),
            EngineError::Other(msg) => msg.clone(),
        }
    }

    /// Check if the engine can keep running after this error.
    ///
    /// Partial registration leaves every valid command usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::Registration(_) | EngineError::PartialRegistration { .. }
        )
    }
}

impl RegistrationReport {
    /// Turn a report with failures into an error.
    pub fn into_result(self) -> Result<RegistrationReport> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(EngineError::PartialRegistration {
                owner: self.owner,
                failures: self.failures,
            })
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
