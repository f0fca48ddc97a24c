//! Command and completer descriptors.
//!
//! Descriptors are immutable once registered. They are built with a small
//! chained builder and validated when handed to a registry.

use serde::{Deserialize, Serialize};

use super::RegistrationError;

/// Which kind of sender may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowedSender {
    /// Any sender.
    #[default]
    All,
    /// Only in-game players.
    Player,
    /// Only the server console.
    Console,
}

impl AllowedSender {
    /// Get the display name for this sender requirement.
    pub fn display(&self) -> &'static str {
        match self {
            Self::All => "anyone",
            Self::Player => "players",
            Self::Console => "the console",
        }
    }
}

/// Metadata describing a single command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Primary name, lowercased. Used as the lookup key.
    pub name: String,
    /// Permission node required to run the command. Empty means no check.
    pub permission: String,
    /// Alternative labels, only forwarded to the host command table.
    pub aliases: Vec<String>,
    /// Usage hint.
    pub usage: String,
    /// Human readable description.
    pub description: String,
    /// Minimum number of arguments.
    pub min_args: usize,
    /// Maximum number of arguments, `None` when unbounded.
    pub max_args: Option<usize>,
    /// Cooldown between uses in seconds. Values below 1 disable it.
    pub cooldown_seconds: i64,
    /// Sender kind allowed to run the command.
    pub allowed_sender: AllowedSender,
}

impl CommandDescriptor {
    /// Create a descriptor with defaults: no permission, no aliases,
    /// unbounded arguments, no cooldown, any sender.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: normalize_label(name.into()),
            permission: String::new(),
            aliases: Vec::new(),
            usage: String::new(),
            description: String::new(),
            min_args: 0,
            max_args: None,
            cooldown_seconds: -1,
            allowed_sender: AllowedSender::All,
        }
    }

    /// Set the permission node. Blank means no permission check.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = normalize_permission(permission.into());
        self
    }

    /// Set the aliases forwarded to the host command table.
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(|a| normalize_label(a.into())).collect();
        self
    }

    /// Set the usage hint shown after argument-count rejections.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Set the human readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the minimum argument count.
    pub fn min_args(mut self, min_args: usize) -> Self {
        self.min_args = min_args;
        self
    }

    /// Set the maximum argument count. `-1` (or any negative value) means
    /// unbounded.
    pub fn max_args(mut self, max_args: i64) -> Self {
        self.max_args = usize::try_from(max_args).ok();
        self
    }

    /// Set the cooldown in seconds. Values below 1 disable it.
    pub fn cooldown(mut self, seconds: i64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    /// Restrict the command to one sender kind.
    pub fn allowed_sender(mut self, allowed: AllowedSender) -> Self {
        self.allowed_sender = allowed;
        self
    }

    /// Whether a permission check applies.
    pub fn requires_permission(&self) -> bool {
        !self.permission.is_empty()
    }

    /// Whether the cooldown is enabled.
    pub fn has_cooldown(&self) -> bool {
        self.cooldown_seconds >= 1
    }

    /// Lowercase and trim the name, aliases and permission.
    ///
    /// The builder already does this. Registries call it again so
    /// descriptors deserialized or assembled field by field are keyed the
    /// same way.
    pub fn normalized(mut self) -> Self {
        self.name = normalize_label(self.name);
        self.aliases = self.aliases.into_iter().map(normalize_label).collect();
        self.permission = normalize_permission(self.permission);
        self
    }

    /// Validate this descriptor.
    ///
    /// # Errors
    ///
    /// Returns a `RegistrationError` if the name or an alias is blank or
    /// contains whitespace, or if the argument bounds are inverted.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        validate_label(&self.name, &self.name)?;
        for alias in &self.aliases {
            validate_label(&self.name, alias)?;
        }

        if let Some(max) = self.max_args {
            if self.min_args > max {
                return Err(RegistrationError::InvalidArgBounds {
                    name: self.name.clone(),
                    min: self.min_args,
                    max,
                });
            }
        }

        Ok(())
    }
}

/// Metadata describing a tab-completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionDescriptor {
    /// Primary name, lowercased.
    pub name: String,
    /// Alternative labels. Matched on lookup, unlike command aliases.
    pub aliases: Vec<String>,
    /// Permission node required to receive suggestions. Empty means no check.
    pub permission: String,
}

impl CompletionDescriptor {
    /// Create a completer descriptor with no aliases and no permission.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: normalize_label(name.into()),
            aliases: Vec::new(),
            permission: String::new(),
        }
    }

    /// Set the aliases this completer also answers to.
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(|a| normalize_label(a.into())).collect();
        self
    }

    /// Set the permission needed to receive suggestions.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = normalize_permission(permission.into());
        self
    }

    /// Lowercase and trim the name, aliases and permission.
    pub fn normalized(mut self) -> Self {
        self.name = normalize_label(self.name);
        self.aliases = self.aliases.into_iter().map(normalize_label).collect();
        self.permission = normalize_permission(self.permission);
        self
    }

    /// Whether a permission check applies.
    pub fn requires_permission(&self) -> bool {
        !self.permission.is_empty()
    }

    /// Check whether `label` is this completer's name or one of its aliases.
    pub fn matches(&self, label: &str) -> bool {
        self.name.eq_ignore_ascii_case(label)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(label))
    }

    /// Validate this descriptor.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        validate_label(&self.name, &self.name)?;
        for alias in &self.aliases {
            validate_label(&self.name, alias)?;
        }
        Ok(())
    }
}

fn normalize_label(label: String) -> String {
    label.trim().to_lowercase()
}

/// Blank permissions collapse to empty so they never trigger a check.
fn normalize_permission(permission: String) -> String {
    permission.trim().to_lowercase()
}

fn validate_label(owner: &str, label: &str) -> Result<(), RegistrationError> {
    if label.is_empty() {
        return Err(RegistrationError::EmptyName);
    }

    if label.contains(char::is_whitespace) {
        return Err(RegistrationError::InvalidName {
            name: owner.to_string(),
            label: label.to_string(),
        });
    }

    Ok(())
}
