//! Senders and invocations.
//!
//! The host hands the engine a sender implementing [`CommandSender`]. The
//! sender's kind is read once when the [`Invocation`] is built, so the
//! pipeline never needs to downcast.

use std::fmt;
use std::sync::Arc;

/// Stable identity of a sender, used to key cooldowns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SenderId(String);

impl SenderId {
    /// Create an identity from any host-side key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity shared by every console sender.
    pub fn console() -> Self {
        Self("console".to_string())
    }

    /// Get the raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of entity issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderKind {
    /// An in-game player.
    Player,
    /// The server console.
    Console,
    /// Anything else the host routes commands from (command blocks, RCON).
    Other,
}

/// Capabilities the engine needs from whoever issued a command.
pub trait CommandSender: Send + Sync {
    /// Identity used for cooldown bookkeeping.
    fn id(&self) -> SenderId;

    /// Display name.
    fn name(&self) -> &str;

    /// Whether this is a player, the console or something else.
    fn kind(&self) -> SenderKind;

    /// Permission lookup, delegated to the host's permission evaluator.
    fn has_permission(&self, permission: &str) -> bool;
}

/// A single command call. Built once per dispatch and handed to the handler.
#[derive(Clone)]
pub struct Invocation {
    sender: Arc<dyn CommandSender>,
    sender_kind: SenderKind,
    command: String,
    label: String,
    arguments: Vec<String>,
}

impl Invocation {
    /// Build an invocation, reading the sender's kind once.
    pub fn new(
        sender: Arc<dyn CommandSender>,
        command: impl Into<String>,
        label: impl Into<String>,
        arguments: Vec<String>,
    ) -> Self {
        let sender_kind = sender.kind();
        Self {
            sender,
            sender_kind,
            command: command.into(),
            label: label.into(),
            arguments,
        }
    }

    /// The sender that issued the command.
    pub fn sender(&self) -> &Arc<dyn CommandSender> {
        &self.sender
    }

    /// Sender kind captured at construction.
    pub fn sender_kind(&self) -> SenderKind {
        self.sender_kind
    }

    /// Whether the sender is an in-game player.
    pub fn is_player(&self) -> bool {
        self.sender_kind == SenderKind::Player
    }

    /// Whether the sender is the server console.
    pub fn is_console(&self) -> bool {
        self.sender_kind == SenderKind::Console
    }

    /// Ask the sender whether it holds `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.sender.has_permission(permission)
    }

    /// The resolved primary command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The label as typed, possibly an alias.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Arguments after the label, split by the host.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Get the argument at `index`, if present.
    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }

    /// Whether no arguments were given.
    pub fn arguments_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("sender", &self.sender.id())
            .field("sender_kind", &self.sender_kind)
            .field("command", &self.command)
            .field("label", &self.label)
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// A sender with a fixed kind and permission set.
///
/// Used by the console host and by tests. A permission of `"*"` grants
/// everything.
#[derive(Debug, Clone)]
pub struct StaticSender {
    id: SenderId,
    name: String,
    kind: SenderKind,
    permissions: Vec<String>,
}

impl StaticSender {
    /// Create a player sender with no permissions.
    pub fn player(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: SenderId::new(format!("player:{}", name.to_lowercase())),
            name,
            kind: SenderKind::Player,
            permissions: Vec::new(),
        }
    }

    /// Create the console sender. The console holds every permission.
    pub fn console() -> Self {
        Self {
            id: SenderId::console(),
            name: "CONSOLE".to_string(),
            kind: SenderKind::Console,
            permissions: vec!["*".to_string()],
        }
    }

    /// Grant additional permissions.
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(|p| p.into().to_lowercase()));
        self
    }
}

impl CommandSender for StaticSender {
    fn id(&self) -> SenderId {
        self.id.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SenderKind {
        self.kind
    }

    fn has_permission(&self, permission: &str) -> bool {
        let permission = permission.to_lowercase();
        self.permissions
            .iter()
            .any(|p| p == "*" || *p == permission)
    }
}
