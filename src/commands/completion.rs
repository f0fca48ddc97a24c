//! Tab-completion registry.
//!
//! Unlike commands, completers are found by name or alias, because the host
//! passes the label exactly as the user typed it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{CompletionDescriptor, Invocation, RegistrationError};

/// Callable producing suggestions for the argument being typed.
pub type Completer = Arc<dyn Fn(&Invocation) -> anyhow::Result<Vec<String>> + Send + Sync>;

/// A completion descriptor bound to its completer.
pub struct CompletionBinding {
    descriptor: CompletionDescriptor,
    completer: Completer,
    owner: String,
}

impl CompletionBinding {
    /// The descriptor this completer was registered with.
    pub fn descriptor(&self) -> &CompletionDescriptor {
        &self.descriptor
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Run the completer.
    pub fn complete(&self, invocation: &Invocation) -> anyhow::Result<Vec<String>> {
        (self.completer)(invocation)
    }
}

impl fmt::Debug for CompletionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBinding")
            .field("descriptor", &self.descriptor)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Registry of completers keyed by primary name, with an alias index.
#[derive(Default)]
pub struct CompletionRegistry {
    bindings: HashMap<String, Arc<CompletionBinding>>,
    /// Every name and alias, mapped to the primary name that owns it.
    labels: HashMap<String, String>,
}

impl CompletionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a completer.
    ///
    /// A completer with the same primary name is replaced entirely, aliases
    /// included. A name or alias already claimed by another completer is
    /// taken over by the new one.
    pub fn register(
        &mut self,
        descriptor: CompletionDescriptor,
        completer: Completer,
        owner: impl Into<String>,
    ) -> Result<Option<Arc<CompletionBinding>>, RegistrationError> {
        let descriptor = descriptor.normalized();
        descriptor.validate()?;

        let name = descriptor.name.clone();
        let replaced = self.bindings.remove(&name);
        if let Some(old) = &replaced {
            warn!(
                completer = %name,
                previous_owner = %old.owner,
                "Completer registered twice, latest registration wins"
            );
            self.labels.retain(|_, primary| *primary != name);
        }

        let labels = std::iter::once(&descriptor.name).chain(descriptor.aliases.iter());
        for label in labels {
            if let Some(previous) = self.labels.insert(label.clone(), name.clone()) {
                if previous != name {
                    warn!(label = %label, from = %previous, to = %name, "Completion label reassigned");
                }
            }
        }

        self.bindings.insert(
            name.clone(),
            Arc::new(CompletionBinding {
                descriptor,
                completer,
                owner: owner.into(),
            }),
        );
        debug!(completer = %name, "Registered completer");

        Ok(replaced)
    }

    /// Find a completer whose name or alias equals `label`, ignoring case.
    pub fn lookup(&self, label: &str) -> Option<Arc<CompletionBinding>> {
        let primary = self.labels.get(&label.to_lowercase())?;
        self.bindings.get(primary).cloned()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
