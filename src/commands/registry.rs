//! Command registry.
//!
//! Maps lowercased primary names to handler bindings. Registering a name
//! that already exists replaces the earlier binding.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{CommandDescriptor, Invocation, RegistrationError};

/// Callable run when a command passes validation.
pub type CommandHandler = Arc<dyn Fn(&Invocation) -> anyhow::Result<()> + Send + Sync>;

/// A command descriptor bound to its handler.
pub struct HandlerBinding {
    descriptor: CommandDescriptor,
    handler: CommandHandler,
    /// Name of the provider that declared the handler. The provider instance
    /// itself lives inside the handler closure.
    owner: String,
}

impl HandlerBinding {
    /// The descriptor this binding was registered with.
    pub fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    /// Name of the provider that declared the handler.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Run the handler.
    pub fn invoke(&self, invocation: &Invocation) -> anyhow::Result<()> {
        (self.handler)(invocation)
    }
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("descriptor", &self.descriptor)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Registry of command handlers keyed by primary name.
#[derive(Default)]
pub struct CommandRegistry {
    bindings: HashMap<String, Arc<HandlerBinding>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `descriptor`.
    ///
    /// Returns the binding that was replaced, if any.
    ///
    /// # Errors
    ///
    /// Returns a `RegistrationError` if the descriptor is invalid. The
    /// registry is left unchanged in that case.
    pub fn register(
        &mut self,
        descriptor: CommandDescriptor,
        handler: CommandHandler,
        owner: impl Into<String>,
    ) -> Result<Option<Arc<HandlerBinding>>, RegistrationError> {
        let descriptor = descriptor.normalized();
        descriptor.validate()?;

        let owner = owner.into();
        let name = descriptor.name.clone();
        let binding = Arc::new(HandlerBinding {
            descriptor,
            handler,
            owner,
        });

        let replaced = self.bindings.insert(name.clone(), binding);
        match &replaced {
            Some(old) => warn!(
                command = %name,
                previous_owner = %old.owner,
                "Command registered twice, latest registration wins"
            ),
            None => debug!(command = %name, "Registered command"),
        }

        Ok(replaced)
    }

    /// Find a binding by primary name, ignoring case. Aliases do not match.
    pub fn lookup(&self, name: &str) -> Option<Arc<HandlerBinding>> {
        self.bindings.get(&name.to_lowercase()).cloned()
    }

    /// Remove a command by primary name.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<HandlerBinding>> {
        self.bindings.remove(&name.to_lowercase())
    }

    /// All registered descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<&CommandDescriptor> {
        let mut descriptors: Vec<_> = self.bindings.values().map(|b| &b.descriptor).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
