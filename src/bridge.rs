//! Host command table bridge.
//!
//! The host owns the canonical command table, resolves aliases and splits
//! command lines into arguments. [`HostBridge`] is what the engine needs from
//! it at registration time. [`CommandTable`] is an in-memory host table used
//! by the console binary and by tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::commands::{CommandDescriptor, CommandSender, Dispatcher};

/// A routable entry in the host's command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommandEntry {
    pub name: String,
    pub aliases: Vec<String>,
    pub usage: String,
    pub permission: String,
    pub description: String,
}

impl From<&CommandDescriptor> for HostCommandEntry {
    fn from(descriptor: &CommandDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            aliases: descriptor.aliases.clone(),
            usage: descriptor.usage.clone(),
            permission: descriptor.permission.clone(),
            description: descriptor.description.clone(),
        }
    }
}

/// Errors a host may raise when asked to create a command entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The label belongs to the host itself.
    #[error("label '{0}' is reserved by the host")]
    Reserved(String),

    /// The host refused the entry for its own reasons.
    #[error("host rejected command: {0}")]
    Rejected(String),
}

/// Registers engine commands into the host's command table.
pub trait HostBridge {
    /// Create a routable entry for `entry`. The host must then route every
    /// matching command line back to the dispatcher.
    fn register_command(&mut self, entry: HostCommandEntry) -> Result<(), BridgeError>;
}

/// A command line split into the typed label and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub label: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Split a raw line on whitespace, dropping a leading `/`.
    ///
    /// Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start();
        let line = line.strip_prefix('/').unwrap_or(line);
        let mut parts = line.split_whitespace();
        let label = parts.next()?.to_string();
        Some(Self {
            label,
            args: parts.map(str::to_string).collect(),
        })
    }

    /// Parse a partially typed line for completion.
    ///
    /// A trailing space means a new, still empty argument is being typed.
    pub fn parse_partial(line: &str) -> Option<Self> {
        let mut parsed = Self::parse(line)?;
        if line.ends_with(char::is_whitespace) {
            parsed.args.push(String::new());
        }
        Some(parsed)
    }
}

/// In-memory host command table.
#[derive(Debug, Default)]
pub struct CommandTable {
    entries: HashMap<String, HostCommandEntry>,
    /// Every name and alias, mapped to its primary name.
    labels: HashMap<String, String>,
    reserved: HashSet<String>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table whose built-in labels cannot be taken by plugins.
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: reserved
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
            ..Self::default()
        }
    }

    /// Resolve a typed label (name or alias) to its entry, ignoring case.
    pub fn resolve(&self, label: &str) -> Option<&HostCommandEntry> {
        let primary = self.labels.get(&label.to_lowercase())?;
        self.entries.get(primary)
    }

    /// Labels starting with `prefix`, sorted.
    pub fn labels_with_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let mut labels: Vec<String> = self
            .labels
            .keys()
            .filter(|l| l.starts_with(&prefix))
            .cloned()
            .collect();
        labels.sort();
        labels
    }

    /// Labels starting with `prefix` whose entry `sender` may run, sorted.
    pub fn labels_visible_to(&self, sender: &dyn CommandSender, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let mut labels: Vec<String> = self
            .labels
            .iter()
            .filter(|(label, _)| label.starts_with(&prefix))
            .filter(|(_, primary)| {
                self.entries
                    .get(primary.as_str())
                    .map_or(false, |e| e.permission.is_empty() || sender.has_permission(&e.permission))
            })
            .map(|(label, _)| label.clone())
            .collect();
        labels.sort();
        labels
    }

    /// All entries, sorted by name.
    pub fn entries(&self) -> Vec<&HostCommandEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Route a command line to the dispatcher.
    ///
    /// Returns `false` when the label matches no entry, leaving the host to
    /// answer with its own unknown-command message.
    pub fn execute(&self, dispatcher: &Dispatcher, sender: Arc<dyn CommandSender>, line: &str) -> bool {
        let Some(parsed) = CommandLine::parse(line) else {
            return false;
        };
        let Some(entry) = self.resolve(&parsed.label) else {
            trace!(label = %parsed.label, "No host entry for label");
            return false;
        };

        dispatcher.on_command(sender, &entry.name, &parsed.label, parsed.args)
    }

    /// Produce suggestions for a partially typed line.
    ///
    /// While the label itself is being typed, labels of entries the sender
    /// may run are suggested. After that the dispatcher's completers take
    /// over. Arguments are only completed for labels with a host entry, so a
    /// completer without a matching command is never reached from here.
    /// Hosts can call [`Dispatcher::on_tab_complete`] directly for those.
    pub fn complete(&self, dispatcher: &Dispatcher, sender: Arc<dyn CommandSender>, line: &str) -> Vec<String> {
        let Some(parsed) = CommandLine::parse_partial(line) else {
            return Vec::new();
        };

        if parsed.args.is_empty() {
            return self.labels_visible_to(sender.as_ref(), &parsed.label);
        }

        match self.resolve(&parsed.label) {
            Some(entry) => dispatcher.on_tab_complete(sender, &entry.name, &parsed.label, parsed.args),
            None => Vec::new(),
        }
    }
}

impl HostBridge for CommandTable {
    fn register_command(&mut self, entry: HostCommandEntry) -> Result<(), BridgeError> {
        let name = entry.name.to_lowercase();
        if self.reserved.contains(&name) {
            return Err(BridgeError::Reserved(name));
        }

        if self.entries.remove(&name).is_some() {
            self.labels.retain(|_, primary| *primary != name);
        }

        for label in std::iter::once(&name).chain(entry.aliases.iter()) {
            let label = label.to_lowercase();
            if self.reserved.contains(&label) {
                warn!(command = %name, alias = %label, "Skipping reserved alias");
                continue;
            }
            if let Some(previous) = self.labels.insert(label.clone(), name.clone()) {
                if previous != name {
                    warn!(label = %label, from = %previous, to = %name, "Host label reassigned");
                }
            }
        }

        debug!(command = %name, aliases = entry.aliases.len(), "Host command entry created");
        self.entries.insert(name, entry);
        Ok(())
    }
}
