use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;
use thiserror::Error;

use crate::proxy::object::panic_message;

/// Handler invoked with the command name and its arguments.
pub type CommandCallback = Arc<dyn Fn(&str, &[String]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command name '{0}' is invalid: it must be non-empty and contain no whitespace")]
    InvalidName(String),

    #[error("there's already a command with the name '{name}' (added by {owner})")]
    AlreadyRegistered { name: String, owner: String },

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("command '{name}' from {owner} failed: {message}")]
    Panicked {
        name: String,
        owner: String,
        message: String,
    },
}

/// A registered console command.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    /// Display name of the mod that added it
    pub owner: String,
    pub documentation: String,
    callback: CommandCallback,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("documentation", &self.documentation)
            .finish()
    }
}

/// Commands registered by every mod, keyed by lower-cased name.
#[derive(Default)]
pub struct CommandManager {
    commands: RwLock<BTreeMap<String, Command>>,
}

impl CommandManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        owner: &str,
        name: &str,
        documentation: &str,
        callback: CommandCallback,
    ) -> Result<(), CommandError> {
        let name = name.trim();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(CommandError::InvalidName(name.to_string()));
        }

        let key = name.to_lowercase();
        let mut commands = self.commands.write();
        if let Some(existing) = commands.get(&key) {
            return Err(CommandError::AlreadyRegistered {
                name: existing.name.clone(),
                owner: existing.owner.clone(),
            });
        }
        trace!("{owner} added command '{name}'");
        commands.insert(
            key,
            Command {
                name: name.to_string(),
                owner: owner.to_string(),
                documentation: documentation.to_string(),
                callback,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Command> {
        self.commands.read().get(&name.trim().to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All commands sorted by name.
    pub fn all(&self) -> Vec<Command> {
        self.commands.read().values().cloned().collect()
    }

    /// Run a command. A panic in the handler is reported as an error
    /// naming the owning mod.
    pub fn trigger(&self, name: &str, args: &[String]) -> Result<(), CommandError> {
        let command = self.get(name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        let callback = command.callback.clone();
        panic::catch_unwind(AssertUnwindSafe(|| callback(&command.name, args))).map_err(|payload| {
            CommandError::Panicked {
                name: command.name.clone(),
                owner: command.owner.clone(),
                message: panic_message(payload.as_ref()),
            }
        })
    }

    /// Split a command line into name and arguments, then run it.
    pub fn trigger_line(&self, line: &str) -> Result<(), CommandError> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.map(str::to_string).collect();
        self.trigger(name, &args)
    }
}

/// A mod's view of the [`CommandManager`]: commands it adds are owned by it.
#[derive(Clone)]
pub struct CommandHelper {
    owner: String,
    manager: Arc<CommandManager>,
}

impl CommandHelper {
    pub fn new(owner: impl Into<String>, manager: Arc<CommandManager>) -> Self {
        Self {
            owner: owner.into(),
            manager,
        }
    }

    pub fn add<F>(&self, name: &str, documentation: &str, callback: F) -> Result<(), CommandError>
    where
        F: Fn(&str, &[String]) + Send + Sync + 'static,
    {
        self.manager.add(&self.owner, name, documentation, Arc::new(callback))
    }

    pub fn trigger(&self, name: &str, args: &[String]) -> Result<(), CommandError> {
        self.manager.trigger(name, args)
    }
}

impl fmt::Debug for CommandHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHelper").field("owner", &self.owner).finish()
    }
}
