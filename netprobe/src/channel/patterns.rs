//! Pattern matching utilities for prompt detection.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::bytes::Regex;

/// CSI, OSC and two-byte escape sequences.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("static ANSI pattern is valid")
});

/// Trait for prompt matching - regex by default, extensible for custom parsers.
pub trait PromptMatcher: Send + Sync {
    /// Returns the `(start, end)` byte range of a prompt at the end of `data`.
    fn find_prompt(&self, data: &[u8]) -> Option<(usize, usize)>;

    /// Check if the data ends in a prompt.
    fn is_match(&self, data: &[u8]) -> bool {
        self.find_prompt(data).is_some()
    }
}

/// Regex-based prompt matcher. Only matches that reach the end of the data
/// (ignoring trailing whitespace) count as a prompt.
impl PromptMatcher for Regex {
    fn find_prompt(&self, data: &[u8]) -> Option<(usize, usize)> {
        self.find_iter(data)
            .filter(|m| ends_at_tail(data, m.end()))
            .last()
            .map(|m| (m.start(), m.end()))
    }
}

fn ends_at_tail(data: &[u8], end: usize) -> bool {
    data[end..].iter().all(u8::is_ascii_whitespace)
}

/// The set of sentinels that mark an interactive prompt for one device family.
///
/// Sentinels are tried in order; the first one that matches at the end of the
/// searched data wins. Families differ (`Router>`/`Router#` versus
/// `[admin@bigip:Active] ~ #`), so a signature usually carries several.
#[derive(Debug, Clone)]
pub struct PromptSignature {
    sentinels: Vec<Regex>,
}

impl PromptSignature {
    /// Build a signature from regular expressions. Patterns without an end
    /// anchor get `\s*$` appended.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let sentinels = patterns
            .iter()
            .map(|p| compile_prompt_pattern(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { sentinels })
    }

    /// Build a signature from literal sentinel strings such as `"]#"`.
    pub fn literals<S: AsRef<str>>(literals: &[S]) -> Result<Self, regex::Error> {
        let escaped: Vec<String> = literals.iter().map(|l| regex::escape(l.as_ref())).collect();
        Self::new(&escaped)
    }

    /// Merge two signatures, keeping this one's sentinels first.
    pub fn union(&self, other: &PromptSignature) -> PromptSignature {
        let mut sentinels = self.sentinels.clone();
        sentinels.extend(other.sentinels.iter().cloned());
        PromptSignature { sentinels }
    }

    /// The compiled sentinels.
    pub fn sentinels(&self) -> &[Regex] {
        &self.sentinels
    }

    /// Whether this signature has no sentinels at all.
    pub fn is_empty(&self) -> bool {
        self.sentinels.is_empty()
    }

    /// Check whether a single line of text looks like a bare prompt.
    pub fn matches_line(&self, line: &str) -> bool {
        let line = line.trim_end();
        !line.is_empty() && self.is_match(line.as_bytes())
    }
}

impl PromptMatcher for PromptSignature {
    fn find_prompt(&self, data: &[u8]) -> Option<(usize, usize)> {
        let cleaned = strip_ansi(data);
        let cleaned = cleaned.as_ref();
        for sentinel in &self.sentinels {
            if let Some((start, end)) = sentinel.find_prompt(cleaned) {
                // Offsets refer to the ANSI-free view. If anything was stripped,
                // map the start back by its distance from the end.
                if cleaned.len() == data.len() {
                    return Some((start, end));
                }
                let suffix = cleaned.len() - start;
                return Some((data.len().saturating_sub(suffix), data.len()));
            }
        }
        None
    }
}

/// Returns true if any sentinel of `signature` is found at the end of `tail`.
///
/// `tail` should be the bounded window of the most recent output, not the
/// whole capture.
pub fn matches(tail: &[u8], signature: &PromptSignature) -> bool {
    signature.is_match(tail)
}

/// Compile a prompt pattern string into a regex.
///
/// Anchors to end of string by default if no anchor specified.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}

/// Remove terminal escape sequences (colors, cursor movement, window titles).
pub fn strip_ansi(data: &[u8]) -> Cow<'_, [u8]> {
    if memchr::memchr(0x1b, data).is_none() {
        return Cow::Borrowed(data);
    }
    ANSI_ESCAPE.replace_all(data, &b""[..])
}
