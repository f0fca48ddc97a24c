//! Handler providers.
//!
//! A provider is any type that owns plugin state and declares the commands
//! and completers it serves. Declarations are plain function references
//! taking the provider and the invocation, so no signature inspection is
//! needed at runtime.

use std::fmt;
use std::sync::Arc;

use super::{
    CommandDescriptor, CommandHandler, Completer, CompletionDescriptor, Invocation,
    RegistrationError,
};

type ProviderHandler<P> = Arc<dyn Fn(&P, &Invocation) -> anyhow::Result<()> + Send + Sync>;
type ProviderCompleter<P> =
    Arc<dyn Fn(&P, &Invocation) -> anyhow::Result<Vec<String>> + Send + Sync>;

/// A type declaring command handlers and completers.
///
/// ```
/// use commandeer::commands::{CommandDescriptor, Declarations, HandlerProvider, Invocation};
///
/// struct Greeter;
///
/// impl Greeter {
///     fn hello(&self, _inv: &Invocation) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
///
/// impl HandlerProvider for Greeter {
///     fn declare(&self, decl: &mut Declarations<Self>) {
///         decl.command(CommandDescriptor::new("hello"), Self::hello);
///     }
/// }
/// ```
pub trait HandlerProvider: Send + Sync + Sized + 'static {
    /// Name used in logs and registration reports.
    fn provider_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Declare every command and completer this provider serves.
    fn declare(&self, decl: &mut Declarations<Self>);
}

/// Collects the declarations of one provider.
pub struct Declarations<P> {
    pub(crate) commands: Vec<(CommandDescriptor, ProviderHandler<P>)>,
    pub(crate) completers: Vec<(CompletionDescriptor, ProviderCompleter<P>)>,
}

impl<P: HandlerProvider> Declarations<P> {
    pub(crate) fn new() -> Self {
        Self {
            commands: Vec::new(),
            completers: Vec::new(),
        }
    }

    /// Declare a command handler.
    pub fn command<F>(&mut self, descriptor: CommandDescriptor, handler: F) -> &mut Self
    where
        F: Fn(&P, &Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.commands.push((descriptor, Arc::new(handler)));
        self
    }

    /// Declare a tab completer.
    pub fn completer<F>(&mut self, descriptor: CompletionDescriptor, completer: F) -> &mut Self
    where
        F: Fn(&P, &Invocation) -> anyhow::Result<Vec<String>> + Send + Sync + 'static,
    {
        self.completers.push((descriptor, Arc::new(completer)));
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len() + self.completers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind every command handler to `owner`.
    pub(crate) fn bind_commands(
        &mut self,
        owner: &Arc<P>,
    ) -> Vec<(CommandDescriptor, CommandHandler)> {
        self.commands
            .drain(..)
            .map(|(descriptor, handler)| {
                let owner = Arc::clone(owner);
                let bound: CommandHandler = Arc::new(move |inv: &Invocation| handler(owner.as_ref(), inv));
                (descriptor, bound)
            })
            .collect()
    }

    /// Bind every completer to `owner`.
    pub(crate) fn bind_completers(
        &mut self,
        owner: &Arc<P>,
    ) -> Vec<(CompletionDescriptor, Completer)> {
        self.completers
            .drain(..)
            .map(|(descriptor, completer)| {
                let owner = Arc::clone(owner);
                let bound: Completer = Arc::new(move |inv: &Invocation| completer(owner.as_ref(), inv));
                (descriptor, bound)
            })
            .collect()
    }
}

/// What happened when a provider was registered.
///
/// Registration is never all-or-nothing: failed entries are listed here and
/// every other entry is still registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Provider name.
    pub owner: String,
    /// Commands that were registered with the engine.
    pub commands: Vec<String>,
    /// Completers that were registered with the engine.
    pub completers: Vec<String>,
    /// Entries that were skipped or only partially registered.
    pub failures: Vec<RegistrationError>,
}

impl RegistrationReport {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }

    /// Whether every declared entry registered cleanly.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RegistrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} commands, {} completers, {} failures",
            self.owner,
            self.commands.len(),
            self.completers.len(),
            self.failures.len()
        )
    }
}
