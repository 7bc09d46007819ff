//! Result type for command execution.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::channel::ReadOutcome;

/// How complete a command's output is believed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    /// The device returned to its prompt.
    Complete,
    /// Collection stopped on a timeout with output pending or truncated.
    Partial,
    /// Nothing remained after normalization.
    Empty,
    /// The device rejected the command (a failure pattern matched).
    Error,
}

/// How far a [`CommandResult`] can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Confidence {
    /// A partial result: collection stopped on a timeout.
    Low,
    /// The flag rests on a prompt match, or on the content itself.
    High,
}

/// Normalized output of one command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Device identity.
    pub host: String,

    /// The command that was executed.
    pub command: String,

    /// Cleaned output: no echo, no trailing prompt, `\n` line endings.
    pub body: String,

    /// The raw output before normalization (lossily decoded).
    pub raw: String,

    /// Completion classification.
    pub completion: Completion,

    /// What ended the collection pass.
    pub outcome: ReadOutcome,

    /// The prompt seen at the end, if any.
    pub prompt: Option<String>,

    /// Time spent collecting.
    pub elapsed: Duration,

    /// Wall-clock time the result was produced.
    pub captured_at: SystemTime,

    /// The failure pattern that matched when `completion` is `Error`.
    pub failure_message: Option<String>,
}

impl CommandResult {
    /// Whether the device returned to its prompt and reported no failure.
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }

    /// Whether the result is usable at face value.
    ///
    /// Partial results are low confidence. Byte counts never raise it.
    pub fn confidence(&self) -> Confidence {
        match self.completion {
            Completion::Partial => Confidence::Low,
            Completion::Complete | Completion::Empty | Completion::Error => Confidence::High,
        }
    }

    /// Whether the body is at least `min_len` bytes long.
    ///
    /// Meant for partial results only, as a hint that a command which
    /// ended on a timeout probably still delivered its payload. It never
    /// upgrades [`completion`](Self::completion).
    pub fn passes_length_heuristic(&self, min_len: usize) -> bool {
        self.body.len() >= min_len
    }

    /// Get the body lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body.lines()
    }

    /// Check if the body contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.body.contains(pattern)
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(body: &str, completion: Completion, outcome: ReadOutcome) -> CommandResult {
        CommandResult {
            host: "r1".to_string(),
            command: "show version".to_string(),
            body: body.to_string(),
            raw: body.to_string(),
            completion,
            outcome,
            prompt: None,
            elapsed: Duration::from_millis(10),
            captured_at: SystemTime::now(),
            failure_message: None,
        }
    }

    #[test]
    fn test_only_partial_is_low_confidence() {
        let ok = result("x", Completion::Complete, ReadOutcome::PromptDetected);
        assert_eq!(ok.confidence(), Confidence::High);
        assert!(ok.is_complete());

        let partial = result("x", Completion::Partial, ReadOutcome::IdleTimeout);
        assert_eq!(partial.confidence(), Confidence::Low);
        assert!(!partial.is_complete());

        let empty = result("", Completion::Empty, ReadOutcome::OverallTimeout);
        assert_eq!(empty.confidence(), Confidence::High);
    }

    #[test]
    fn test_length_heuristic_does_not_upgrade() {
        let partial = result(&"a".repeat(500), Completion::Partial, ReadOutcome::OverallTimeout);
        assert!(partial.passes_length_heuristic(100));
        assert!(!partial.passes_length_heuristic(1_000));
        assert_eq!(partial.completion, Completion::Partial);
        assert_eq!(partial.confidence(), Confidence::Low);
    }

    #[test]
    fn test_display_and_lines() {
        let r = result("line one\nline two", Completion::Complete, ReadOutcome::PromptDetected);
        assert_eq!(r.to_string(), "line one\nline two");
        assert_eq!(r.lines().count(), 2);
        assert!(r.contains("two"));
    }
}
