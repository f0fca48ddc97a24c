//! Command registration and dispatch.
//!
//! This module provides:
//! - Command and completer descriptors
//! - Registries binding descriptors to handlers
//! - Per-sender cooldown tracking
//! - The dispatcher running the validation pipeline

mod completion;
pub(crate) mod cooldown;
mod descriptor;
mod dispatch;
mod error;
mod invocation;
mod provider;
mod registry;

pub use completion::{Completer, CompletionBinding, CompletionRegistry};
pub use cooldown::{Clock, CooldownCheck, CooldownTracker, ManualClock, MonotonicClock};
pub use descriptor::{AllowedSender, CommandDescriptor, CompletionDescriptor};
pub use dispatch::{
    DispatchOutcome, Dispatcher, DispatcherBuilder, ErrorReporter, Fallback, LogNotifier,
    LogReporter, RejectionNotifier,
};
pub use error::{HandlerFailure, Rejection, RegistrationError};
pub use invocation::{CommandSender, Invocation, SenderId, SenderKind, StaticSender};
pub use provider::{Declarations, HandlerProvider, RegistrationReport};
pub use registry::{CommandHandler, CommandRegistry, HandlerBinding};
