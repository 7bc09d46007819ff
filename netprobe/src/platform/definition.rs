//! Platform definition for a device family.

use regex::Regex;

use super::catalog::{CommandCatalog, CommandSpec};
use super::elevation::Elevation;
use super::shell::ShellSwitch;
use crate::channel::PromptSignature;
use crate::error::{PlatformError, Result};

/// Everything the session driver needs to know about one device family.
///
/// Definitions are plain data. They are cheap to clone (compiled regexes are
/// reference counted) and are shared between sessions behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g. `"cisco_ios"`, `"f5_bigip"`).
    pub name: String,

    /// Any prompt of this family, privileged or not.
    pub prompt: PromptSignature,

    /// Privilege elevation dialog, if the family has one.
    pub elevation: Option<Elevation>,

    /// Shell the catalog is written for, if the family has more than one.
    pub shell: Option<ShellSwitch>,

    /// Command that disables paged output for the session.
    pub pagination_command: Option<String>,

    /// Pager prompts (`--More--`) and their redraw sequences, removed from
    /// output.
    pub pager_patterns: Vec<Regex>,

    /// Command sent before the channel is released.
    pub close_command: Option<String>,

    /// Appended to every line sent to the device.
    pub line_terminator: String,

    /// Output substrings that mean the device rejected a command.
    pub failed_when_contains: Vec<String>,

    /// Logical operations and their command text.
    pub catalog: CommandCatalog,
}

impl PlatformDefinition {
    /// Create a new platform definition with minimal required fields.
    pub fn new(name: impl Into<String>, prompt: PromptSignature) -> Self {
        Self {
            name: name.into(),
            prompt,
            elevation: None,
            shell: None,
            pagination_command: None,
            pager_patterns: vec![],
            close_command: None,
            line_terminator: "\n".to_string(),
            failed_when_contains: vec![],
            catalog: CommandCatalog::new(),
        }
    }

    /// Set the elevation dialog.
    pub fn with_elevation(mut self, elevation: Elevation) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Set the shell switch.
    pub fn with_shell(mut self, shell: ShellSwitch) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Add a pager marker pattern.
    pub fn with_pager_pattern(mut self, pattern: Regex) -> Self {
        self.pager_patterns.push(pattern);
        self
    }

    /// Set the pagination-disable command.
    pub fn with_pagination_command(mut self, command: impl Into<String>) -> Self {
        self.pagination_command = Some(command.into());
        self
    }

    /// Set the command sent on close.
    pub fn with_close_command(mut self, command: impl Into<String>) -> Self {
        self.close_command = Some(command.into());
        self
    }

    /// Set the line terminator.
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add a catalog entry.
    pub fn with_command(mut self, name: impl Into<String>, spec: CommandSpec) -> Self {
        self.catalog.insert(name, spec);
        self
    }

    /// Replace or extend the catalog; entries in `catalog` win.
    pub fn with_catalog(mut self, catalog: CommandCatalog) -> Self {
        self.catalog.merge(catalog);
        self
    }

    /// Look up a catalog entry.
    pub fn command(&self, name: &str) -> Option<&CommandSpec> {
        self.catalog.get(name)
    }

    /// Whether a prompt means the session is privileged.
    ///
    /// Families without an elevation dialog are always privileged.
    pub fn is_privileged_prompt(&self, prompt: &str) -> bool {
        match &self.elevation {
            Some(elevation) => elevation.is_privileged(prompt),
            None => true,
        }
    }

    /// The first failure pattern found in `output`.
    pub fn find_failure<'a>(&'a self, output: &str) -> Option<&'a str> {
        self.failed_when_contains
            .iter()
            .map(String::as_str)
            .find(|pattern| output.contains(pattern))
    }

    /// Check that the definition can drive a session.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PlatformError::InvalidDefinition {
                message: "platform name is empty".to_string(),
            }
            .into());
        }
        if self.prompt.is_empty() {
            return Err(PlatformError::InvalidDefinition {
                message: format!("platform '{}' has no prompt sentinels", self.name),
            }
            .into());
        }
        if self.line_terminator.is_empty() {
            return Err(PlatformError::InvalidDefinition {
                message: format!("platform '{}' has an empty line terminator", self.name),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> PlatformDefinition {
        PlatformDefinition::new("shell", PromptSignature::new(&[r"[$#]"]).unwrap())
            .with_failure_pattern("command not found")
            .with_close_command("exit")
    }

    #[test]
    fn test_defaults() {
        let platform = shell();
        assert_eq!(platform.line_terminator, "\n");
        assert!(platform.elevation.is_none());
        assert!(platform.pagination_command.is_none());
        assert!(platform.shell.is_none());
        assert!(platform.pager_patterns.is_empty());
        assert!(platform.validate().is_ok());
    }

    #[test]
    fn test_no_elevation_means_privileged() {
        assert!(shell().is_privileged_prompt("$ "));
    }

    #[test]
    fn test_find_failure() {
        let platform = shell();
        assert_eq!(
            platform.find_failure("bash: shw: command not found"),
            Some("command not found")
        );
        assert_eq!(platform.find_failure("all good"), None);
    }

    #[test]
    fn test_validate_rejects_empty_prompt() {
        let platform = PlatformDefinition::new("empty", PromptSignature::new::<&str>(&[]).unwrap());
        let err = platform.validate().unwrap_err();
        assert!(err.to_string().contains("no prompt sentinels"));
    }

    #[test]
    fn test_catalog_lookup() {
        let platform = shell().with_command("uptime", CommandSpec::new("uptime"));
        assert_eq!(platform.command("uptime").unwrap().command, "uptime");
        assert!(platform.command("reboot").is_none());
    }
}
