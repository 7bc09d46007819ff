//! Command catalog: logical operations mapped to device commands.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Timeout budget for one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    /// Hard ceiling for the whole pass.
    pub overall: Duration,

    /// Silent gap after the last byte that ends the pass.
    pub idle: Duration,
}

impl TimeoutPolicy {
    /// Create a policy.
    pub const fn new(overall: Duration, idle: Duration) -> Self {
        Self { overall, idle }
    }

    /// Convenience constructor from whole seconds and milliseconds.
    pub const fn from_secs_millis(overall_secs: u64, idle_millis: u64) -> Self {
        Self {
            overall: Duration::from_secs(overall_secs),
            idle: Duration::from_millis(idle_millis),
        }
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Literal command text sent to the device.
    pub command: String,

    /// Budget for this command class. Falls back to the session default.
    #[serde(default)]
    pub timeouts: Option<TimeoutPolicy>,

    /// Output shorter than this is suspicious when no prompt was seen.
    /// Only ever used as a low-confidence hint.
    #[serde(default)]
    pub min_output_len: Option<usize>,
}

impl CommandSpec {
    /// A command using the session's default timeouts.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeouts: None,
            min_output_len: None,
        }
    }

    /// Set the timeout budget.
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Set the low-confidence length hint.
    pub fn with_min_output_len(mut self, len: usize) -> Self {
        self.min_output_len = Some(len);
        self
    }
}

/// Ordered mapping from logical operation names (e.g. `"software_version"`)
/// to command specs for one device family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandCatalog {
    entries: IndexMap<String, CommandSpec>,
}

impl CommandCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, spec: CommandSpec) -> Option<CommandSpec> {
        self.entries.insert(name.into(), spec)
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, spec: CommandSpec) -> Self {
        self.insert(name, spec);
        self
    }

    /// Look up an operation.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.entries.get(name)
    }

    /// Operation names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay another catalog; its entries win.
    pub fn merge(&mut self, other: CommandCatalog) {
        self.entries.extend(other.entries);
    }
}
