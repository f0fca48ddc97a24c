//! Error and rejection types for command registration and dispatch.

use std::time::Duration;

use thiserror::Error;

use super::AllowedSender;

/// Errors that cause a single registration entry to be skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The command or completer has no name.
    #[error("command name cannot be empty")]
    EmptyName,

    /// A name or alias contains whitespace.
    #[error("command '{name}': label '{label}' cannot contain whitespace")]
    InvalidName { name: String, label: String },

    /// `min_args` is greater than `max_args`.
    #[error("command '{name}': min_args {min} exceeds max_args {max}")]
    InvalidArgBounds { name: String, min: usize, max: usize },

    /// The host refused to create a command entry.
    #[error("command '{name}': host registration failed: {reason}")]
    Bridge { name: String, reason: String },
}

/// Why the dispatch pipeline stopped before invoking a handler.
///
/// The host is always told the command was handled. Rejections are passed
/// to a [`RejectionNotifier`](super::RejectionNotifier) so the sender can be
/// told what went wrong.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    /// No command is registered under the dispatched name and the fallback
    /// did not handle it.
    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    /// The command is restricted to another sender kind.
    #[error("this command can only be used by {}", .required.display())]
    WrongSenderKind { required: AllowedSender },

    /// The sender lacks the command's permission.
    #[error("missing permission '{permission}'")]
    MissingPermission { permission: String },

    /// The command was used too recently.
    #[error("please wait {remaining_seconds}s before using this command again")]
    OnCooldown { remaining_seconds: i64 },

    /// Fewer arguments than `min_args`.
    #[error("too few arguments: expected at least {min}, got {given}")]
    TooFewArgs { min: usize, given: usize },

    /// More arguments than `max_args`.
    #[error("too many arguments: expected at most {max}, got {given}")]
    TooManyArgs { max: usize, given: usize },
}

impl Rejection {
    /// Short machine-friendly tag, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::UnknownCommand { .. } => "unknown_command",
            Rejection::WrongSenderKind { .. } => "wrong_sender_kind",
            Rejection::MissingPermission { .. } => "missing_permission",
            Rejection::OnCooldown { .. } => "on_cooldown",
            Rejection::TooFewArgs { .. } => "too_few_args",
            Rejection::TooManyArgs { .. } => "too_many_args",
        }
    }

    /// Whether the sender should be shown the command's usage line.
    pub fn shows_usage(&self) -> bool {
        matches!(
            self,
            Rejection::TooFewArgs { .. } | Rejection::TooManyArgs { .. }
        )
    }
}

/// A handler or completer that did not complete cleanly.
#[derive(Debug, Error)]
pub enum HandlerFailure {
    /// The handler returned an error.
    #[error("handler returned an error: {0:#}")]
    Failed(anyhow::Error),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The handler finished but blocked the caller for too long.
    #[error("handler took {elapsed:?} (threshold {threshold:?})")]
    Slow {
        elapsed: Duration,
        threshold: Duration,
    },
}

impl HandlerFailure {
    /// Build a failure from a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        HandlerFailure::Panicked(message)
    }

    /// Slow handlers did run to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, HandlerFailure::Slow { .. })
    }
}
