//! Shell the command catalog is written for.

use crate::channel::PromptSignature;

/// How a family reaches the shell its catalog targets.
///
/// Some devices land an account in one of several shells (BIG-IP: bash or
/// tmsh) depending on its settings. When the landing prompt is not a
/// `target` prompt, `enter_commands` are tried in order. If none of them
/// reaches the target, every command is sent with `command_prefix` instead
/// (`tmsh show sys version` from bash).
#[derive(Debug, Clone)]
pub struct ShellSwitch {
    /// Prompts of the target shell.
    pub target: PromptSignature,

    /// Commands that start the target shell.
    pub enter_commands: Vec<String>,

    /// Prefix that runs one command in the target shell, if the family has one.
    pub command_prefix: Option<String>,
}

impl ShellSwitch {
    /// A switch into the shell whose prompts match `target`.
    pub fn new(target: PromptSignature) -> Self {
        Self {
            target,
            enter_commands: Vec::new(),
            command_prefix: None,
        }
    }

    /// Add a command that starts the target shell.
    pub fn with_enter_command(mut self, command: impl Into<String>) -> Self {
        self.enter_commands.push(command.into());
        self
    }

    /// Set the per-command fallback prefix.
    pub fn with_command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.command_prefix = Some(prefix.into());
        self
    }

    /// Whether `prompt` belongs to the target shell.
    pub fn is_target(&self, prompt: &str) -> bool {
        self.target.matches_line(prompt)
    }
}
