//! Privilege elevation dialog definition.

use crate::channel::PromptSignature;

/// How a device family moves from a restricted to a privileged mode.
///
/// The dialog is: send `command`; if `secret_prompt` appears, answer with the
/// elevation secret; the session is privileged once a prompt matching
/// `privileged` comes back.
#[derive(Debug, Clone)]
pub struct Elevation {
    /// Command that requests elevation (e.g. `enable`).
    pub command: String,

    /// Prompt asking for the elevation secret.
    pub secret_prompt: PromptSignature,

    /// Prompts that only appear in privileged mode.
    pub privileged: PromptSignature,
}

impl Elevation {
    /// Create an elevation dialog definition.
    pub fn new(
        command: impl Into<String>,
        secret_prompt: &str,
        privileged: &[&str],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            command: command.into(),
            secret_prompt: PromptSignature::new(&[secret_prompt])?,
            privileged: PromptSignature::new(privileged)?,
        })
    }

    /// Check if a prompt indicates privileged mode.
    pub fn is_privileged(&self, prompt: &str) -> bool {
        self.privileged.matches_line(prompt)
    }

    /// Check if a prompt is the secret request.
    pub fn is_secret_prompt(&self, prompt: &str) -> bool {
        self.secret_prompt.matches_line(prompt)
    }

    /// Everything that can end a step of the dialog: the secret prompt first,
    /// then any regular prompt of the family.
    pub fn dialog_signature(&self, prompt: &PromptSignature) -> PromptSignature {
        self.secret_prompt.union(prompt)
    }
}
