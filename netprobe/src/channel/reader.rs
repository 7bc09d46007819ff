//! Adaptive output collection over a non-blocking shell channel.
//!
//! Devices stream output at unpredictable rates, so a blocking read cannot
//! tell "still producing" from "hung". [`collect`] polls instead: it drains
//! whatever is ready, checks the tail for a prompt, and otherwise sleeps one
//! poll interval. It stops on the first of prompt match, idle gap, or the
//! overall deadline.

use std::borrow::Cow;
use std::time::Duration;

use log::trace;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::patterns::PromptMatcher;
use crate::error::Result;
use crate::transport::ShellChannel;

/// Limits for one collection pass.
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// Hard wall-clock ceiling for the pass.
    pub overall_timeout: Duration,

    /// Maximum silent gap after the last received byte.
    pub idle_timeout: Duration,

    /// Maximum bytes requested per receive call.
    pub chunk_size: usize,

    /// Sleep between availability checks.
    pub poll_interval: Duration,

    /// Search depth for prompt matching.
    pub search_depth: usize,
}

impl ReadConfig {
    /// Create a config with the given timeouts and default polling settings.
    pub fn new(overall_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            overall_timeout,
            idle_timeout,
            ..Self::default()
        }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            overall_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(2),
            chunk_size: 65535,
            poll_interval: Duration::from_millis(100),
            search_depth: 1000,
        }
    }
}

/// Why a collection pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadOutcome {
    /// A prompt sentinel matched the tail of the collected bytes.
    PromptDetected,
    /// Bytes had arrived, then nothing more for the idle timeout.
    IdleTimeout,
    /// The overall deadline was reached.
    OverallTimeout,
}

impl ReadOutcome {
    /// Whether the pass ended on a positive prompt match.
    pub fn is_prompt(self) -> bool {
        self == ReadOutcome::PromptDetected
    }
}

/// Result of a collection pass.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The raw bytes that were read.
    pub data: Vec<u8>,

    /// Time spent in the pass.
    pub elapsed: Duration,

    /// What ended the pass.
    pub outcome: ReadOutcome,

    /// The matched prompt text when `outcome` is `PromptDetected`.
    pub prompt: Option<String>,
}

impl ReadResult {
    /// Get the data as a string (lossy UTF-8).
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Whether nothing at all was received.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read from `channel` until `stop` matches the tail, the channel goes idle,
/// or the overall deadline passes.
///
/// The idle clock only starts once the first byte has arrived; a channel
/// that never produces data ends with [`ReadOutcome::OverallTimeout`] and an
/// empty body. Bytes already received are never discarded on timeout.
/// Returns within `overall_timeout` plus at most one poll interval.
///
/// # Errors
///
/// Only transport faults are errors. Timeouts are reported through
/// [`ReadResult::outcome`].
pub async fn collect<C, M>(channel: &mut C, config: &ReadConfig, stop: &M) -> Result<ReadResult>
where
    C: ShellChannel,
    M: PromptMatcher + ?Sized,
{
    let start = Instant::now();
    let deadline = start + config.overall_timeout;
    let mut buffer = PatternBuffer::new(config.search_depth);
    let mut last_received: Option<Instant> = None;

    let outcome = loop {
        if channel.data_available()? {
            let chunk = channel.receive(config.chunk_size)?;
            if !chunk.is_empty() {
                trace!("collect: {} bytes, total {}", chunk.len(), buffer.len() + chunk.len());
                buffer.extend(&chunk);
                last_received = Some(Instant::now());

                if buffer.tail_matches(stop) {
                    break ReadOutcome::PromptDetected;
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            break ReadOutcome::OverallTimeout;
        }
        if let Some(last) = last_received {
            if now.duration_since(last) >= config.idle_timeout {
                break ReadOutcome::IdleTimeout;
            }
        }

        let remaining = deadline - now;
        tokio::time::sleep(config.poll_interval.min(remaining)).await;
    };

    let prompt = match outcome {
        ReadOutcome::PromptDetected => buffer.search_tail(stop),
        _ => None,
    };

    let elapsed = start.elapsed();
    trace!("collect: ended with {:?} after {:?}", outcome, elapsed);

    Ok(ReadResult {
        data: buffer.take(),
        elapsed,
        outcome,
        prompt,
    })
}
