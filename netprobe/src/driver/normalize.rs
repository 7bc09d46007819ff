//! Output normalization.
//!
//! Turns the raw bytes of a collection pass into clean text: escape
//! sequences and pager markers removed, `\n` line endings, no command
//! echo, no trailing prompt. Classification into [`Completion`] happens here too.

use std::time::SystemTime;

use regex::Regex;

use crate::channel::{PromptSignature, ReadOutcome, ReadResult, strip_ansi};
use crate::platform::PlatformDefinition;

use super::response::{CommandResult, Completion};

/// Cleans and classifies command output for one device family.
#[derive(Debug, Clone)]
pub struct Normalizer {
    prompt: PromptSignature,
    pagination_command: Option<String>,
    pager_patterns: Vec<Regex>,
    failed_when_contains: Vec<String>,
}

impl Normalizer {
    /// Build a normalizer from a platform definition.
    pub fn new(platform: &PlatformDefinition) -> Self {
        Self {
            prompt: platform.prompt.clone(),
            pagination_command: platform.pagination_command.clone(),
            pager_patterns: platform.pager_patterns.clone(),
            failed_when_contains: platform.failed_when_contains.clone(),
        }
    }

    /// Clean raw output of `command`.
    pub fn clean(&self, raw: &[u8], command: &str) -> String {
        let stripped = strip_ansi(raw);
        let mut text = String::from_utf8_lossy(&stripped).into_owned();
        // Markers go before line endings are unified; their redraw uses bare \r
        for pattern in &self.pager_patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }
        let text = unify_line_endings(&text);
        let text = remove_echo(&text, command);

        let mut lines: Vec<&str> = text
            .lines()
            .filter(|line| !self.is_pagination_echo(line))
            .collect();

        // A prompt can be redrawn more than once (e.g. after a nudge)
        while let Some(last) = lines.last() {
            if last.trim().is_empty() || self.prompt.matches_line(last) {
                lines.pop();
            } else {
                break;
            }
        }

        let first = lines
            .iter()
            .position(|line| !line.trim().is_empty())
            .unwrap_or(lines.len());
        lines[first..].join("\n").trim_end().to_string()
    }

    /// Classify a cleaned body.
    ///
    /// Returns the completion flag and, for [`Completion::Error`], the
    /// failure pattern that matched.
    pub fn classify(&self, body: &str, outcome: ReadOutcome) -> (Completion, Option<String>) {
        if body.trim().is_empty() {
            return (Completion::Empty, None);
        }
        if let Some(pattern) = self
            .failed_when_contains
            .iter()
            .find(|pattern| body.contains(pattern.as_str()))
        {
            return (Completion::Error, Some(pattern.clone()));
        }
        if outcome.is_prompt() {
            (Completion::Complete, None)
        } else {
            (Completion::Partial, None)
        }
    }

    /// Produce the final [`CommandResult`] for a collection pass.
    ///
    /// `sent` is the line actually written to the shell, which differs from
    /// `command` when the family runs commands through a prefix.
    pub fn normalize(&self, host: &str, command: &str, sent: &str, read: ReadResult) -> CommandResult {
        let body = self.clean(&read.data, sent);
        let (completion, failure_message) = self.classify(&body, read.outcome);

        CommandResult {
            host: host.to_string(),
            command: command.to_string(),
            raw: read.as_str().into_owned(),
            body,
            completion,
            outcome: read.outcome,
            prompt: read.prompt,
            elapsed: read.elapsed,
            captured_at: SystemTime::now(),
            failure_message,
        }
    }

    fn is_pagination_echo(&self, line: &str) -> bool {
        self.pagination_command
            .as_deref()
            .is_some_and(|cmd| line.contains(cmd))
    }
}

/// Convert `\r\n` and stray `\r` to `\n`-only text.
fn unify_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "")
}

/// Drop the echoed command line, then any other literal occurrence of the
/// command.
fn remove_echo(text: &str, command: &str) -> String {
    let command = command.trim();
    if command.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut echo_seen = false;
    for line in text.split_inclusive('\n') {
        // The echo may carry the prompt in front of it
        if !echo_seen && line.trim_end().ends_with(command) {
            echo_seen = true;
            continue;
        }
        out.push_str(line);
    }

    // Removing one occurrence can join its neighbours into another
    while out.contains(command) {
        out = out.replace(command, "");
    }
    out
}
