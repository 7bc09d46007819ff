//! Channel layer: adaptive output collection and prompt detection.
//!
//! This module turns a raw [`ShellChannel`](crate::transport::ShellChannel)
//! into bounded collection passes. [`collect`] is the reader; prompt
//! detection is [`matches`] over a bounded tail with a [`PromptSignature`].

mod buffer;
mod patterns;
mod reader;

pub use buffer::PatternBuffer;
pub use patterns::{PromptMatcher, PromptSignature, compile_prompt_pattern, matches, strip_ansi};
pub use reader::{ReadConfig, ReadOutcome, ReadResult, collect};
