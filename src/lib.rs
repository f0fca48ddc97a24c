//! Commandeer - command registration, dispatch and cooldowns for plugin hosts.
//!
//! Plugins describe their commands with [`commands::CommandDescriptor`] and
//! bind them through a [`commands::HandlerProvider`]. The host routes every
//! matching command line to [`commands::Dispatcher::on_command`], which
//! checks sender kind, permission, cooldown and argument count before calling
//! the handler.

pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

pub use error::{EngineError, Result};
