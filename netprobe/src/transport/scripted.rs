//! A scriptable, clock-driven shell channel for tests and dry runs.
//!
//! Output is scheduled on the tokio clock, so tests running with a paused
//! runtime (`#[tokio::test(start_paused = true)]`) replay device timing
//! deterministically.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use netprobe::transport::ScriptedChannel;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let channel = ScriptedChannel::new()
//!     .output_at(Duration::ZERO, "Router>")
//!     .respond("enable", "Password: ")
//!     .respond("cisco", "\r\nRouter#");
//! let handle = channel.handle();
//! # drop(channel);
//! assert_eq!(handle.close_count(), 0);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::trace;
use tokio::time::Instant;

use super::ShellChannel;
use crate::error::{ChannelError, Result};

#[derive(Debug, Clone)]
enum ScriptEvent {
    Output(Vec<u8>),
    Disconnect,
}

/// What the scripted device does after receiving a particular line.
#[derive(Debug, Clone, Default)]
pub struct Reaction {
    events: Vec<(Duration, ScriptEvent)>,
}

impl Reaction {
    /// An empty reaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `text` after `delay`.
    pub fn output_after(mut self, delay: Duration, text: impl AsRef<[u8]>) -> Self {
        self.events
            .push((delay, ScriptEvent::Output(text.as_ref().to_vec())));
        self
    }

    /// Emit `text` `count` times, one chunk every `interval`.
    pub fn stream_every(mut self, interval: Duration, count: u32, text: impl AsRef<[u8]>) -> Self {
        for i in 1..=count {
            self.events
                .push((interval * i, ScriptEvent::Output(text.as_ref().to_vec())));
        }
        self
    }

    /// Drop the connection after `delay`.
    pub fn disconnect_after(mut self, delay: Duration) -> Self {
        self.events.push((delay, ScriptEvent::Disconnect));
        self
    }
}

#[derive(Debug)]
struct Rule {
    line: String,
    reaction: Reaction,
    repeat: bool,
    used: bool,
}

#[derive(Debug)]
struct ScriptState {
    pending: Vec<(Instant, ScriptEvent)>,
    ready: VecDeque<u8>,
    rules: Vec<Rule>,
    sent: Vec<u8>,
    echo: bool,
    disconnected: bool,
    closed: bool,
    close_calls: usize,
}

impl ScriptState {
    fn schedule(&mut self, at: Instant, event: ScriptEvent) {
        // Stable: events at the same instant keep insertion order
        let pos = self.pending.partition_point(|(t, _)| *t <= at);
        self.pending.insert(pos, (at, event));
    }

    fn promote_due(&mut self) {
        let now = Instant::now();
        let due = self.pending.partition_point(|(t, _)| *t <= now);
        for (_, event) in self.pending.drain(..due) {
            match event {
                ScriptEvent::Output(data) => self.ready.extend(data),
                ScriptEvent::Disconnect => self.disconnected = true,
            }
        }
    }

    fn react_to(&mut self, line: &str) {
        let now = Instant::now();
        let Some(rule) = self
            .rules
            .iter_mut()
            .find(|r| r.line == line && (r.repeat || !r.used))
        else {
            return;
        };
        rule.used = true;
        let events = rule.reaction.events.clone();
        for (delay, event) in events {
            self.schedule(now + delay, event);
        }
    }
}

/// A [`ShellChannel`] that plays back a scripted device.
///
/// Sent lines are echoed back (like a PTY) unless [`without_echo`] is used,
/// and lines registered with [`respond`]/[`on_line`] trigger scheduled
/// output. Each registered rule fires once unless registered with
/// [`respond_always`].
///
/// [`without_echo`]: ScriptedChannel::without_echo
/// [`respond`]: ScriptedChannel::respond
/// [`on_line`]: ScriptedChannel::on_line
/// [`respond_always`]: ScriptedChannel::respond_always
#[derive(Debug)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ScriptState>>,
    start: Instant,
}

impl ScriptedChannel {
    /// A silent channel with echo enabled. Offsets are measured from now.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                pending: Vec::new(),
                ready: VecDeque::new(),
                rules: Vec::new(),
                sent: Vec::new(),
                echo: true,
                disconnected: false,
                closed: false,
                close_calls: 0,
            })),
            start: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Do not echo sent data back.
    pub fn without_echo(self) -> Self {
        self.lock().echo = false;
        self
    }

    /// Emit `text` at `offset` from creation.
    pub fn output_at(self, offset: Duration, text: &str) -> Self {
        self.output_bytes_at(offset, text.as_bytes())
    }

    /// Emit raw bytes at `offset` from creation.
    pub fn output_bytes_at(self, offset: Duration, data: &[u8]) -> Self {
        let at = self.start + offset;
        self.lock().schedule(at, ScriptEvent::Output(data.to_vec()));
        self
    }

    /// Emit `text` `count` times, one chunk every `interval`, starting now.
    pub fn stream_every(self, interval: Duration, count: u32, text: &str) -> Self {
        for i in 0..count {
            let at = self.start + interval * i;
            self.lock()
                .schedule(at, ScriptEvent::Output(text.as_bytes().to_vec()));
        }
        self
    }

    /// Drop the connection at `offset` from creation.
    pub fn disconnect_at(self, offset: Duration) -> Self {
        let at = self.start + offset;
        self.lock().schedule(at, ScriptEvent::Disconnect);
        self
    }

    /// Reply immediately with `text` the next time `line` is sent.
    pub fn respond(self, line: &str, text: &str) -> Self {
        self.on_line(line, Reaction::new().output_after(Duration::ZERO, text))
    }

    /// Reply with `text` every time `line` is sent.
    pub fn respond_always(self, line: &str, text: &str) -> Self {
        self.lock().rules.push(Rule {
            line: line.to_string(),
            reaction: Reaction::new().output_after(Duration::ZERO, text),
            repeat: true,
            used: false,
        });
        self
    }

    /// Run `reaction` the next time `line` is sent.
    pub fn on_line(self, line: &str, reaction: Reaction) -> Self {
        self.lock().rules.push(Rule {
            line: line.to_string(),
            reaction,
            repeat: false,
            used: false,
        });
        self
    }

    /// A handle for inspecting the channel after it has been moved into a session.
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellChannel for ScriptedChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.closed || state.disconnected {
            return Err(ChannelError::Closed.into());
        }
        state.sent.extend_from_slice(data);

        if state.echo {
            for &b in data {
                if b == b'\n' {
                    state.ready.push_back(b'\r');
                }
                state.ready.push_back(b);
            }
        }

        let text = String::from_utf8_lossy(data).into_owned();
        let mut lines: Vec<&str> = text.split('\n').collect();
        // The segment after the last terminator is not a complete line
        lines.pop();
        for line in lines {
            let line = line.trim_end_matches('\r');
            trace!("scripted: received line {:?}", line);
            state.react_to(line);
        }
        Ok(())
    }

    fn data_available(&mut self) -> Result<bool> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::Closed.into());
        }
        state.promote_due();
        if !state.ready.is_empty() {
            Ok(true)
        } else if state.disconnected {
            Err(ChannelError::Closed.into())
        } else {
            Ok(false)
        }
    }

    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::Closed.into());
        }
        state.promote_due();
        if state.ready.is_empty() && state.disconnected {
            return Err(ChannelError::Closed.into());
        }
        let n = max_bytes.min(state.ready.len());
        Ok(state.ready.drain(..n).collect())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.closed = true;
        Ok(())
    }
}

/// Inspection handle for a [`ScriptedChannel`].
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything sent so far, lossily decoded.
    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().sent).into_owned()
    }

    /// Complete lines sent so far, without terminators.
    pub fn sent_lines(&self) -> Vec<String> {
        let text = self.sent_text();
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        lines.pop();
        lines
    }

    /// How many times `close()` was called on the channel.
    pub fn close_count(&self) -> usize {
        self.lock().close_calls
    }

    /// Whether the channel has been closed by its owner.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_echo_and_response() {
        let mut channel = ScriptedChannel::new().respond("show clock", "*10:00:00 UTC\r\nR1#");
        let handle = channel.handle();

        channel.send(b"show clock\n").await.unwrap();
        assert!(channel.data_available().unwrap());
        let data = channel.receive(1024).unwrap();
        assert_eq!(data, b"show clock\r\n*10:00:00 UTC\r\nR1#");
        assert_eq!(handle.sent_lines(), vec!["show clock"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_output() {
        let mut channel = ScriptedChannel::new().output_at(Duration::from_secs(2), "R1>");

        assert!(!channel.data_available().unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(channel.data_available().unwrap());
        assert_eq!(channel.receive(2).unwrap(), b"R1");
        assert_eq!(channel.receive(10).unwrap(), b">");
        assert!(!channel.data_available().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rules_fire_once_in_order() {
        let mut channel = ScriptedChannel::new()
            .without_echo()
            .respond("", "first")
            .respond("", "second");

        channel.send(b"\n").await.unwrap();
        assert_eq!(channel.receive(64).unwrap(), b"first");
        channel.send(b"\n").await.unwrap();
        assert_eq!(channel.receive(64).unwrap(), b"second");
        channel.send(b"\n").await.unwrap();
        assert!(!channel.data_available().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_after_buffered_data() {
        let mut channel = ScriptedChannel::new()
            .output_at(Duration::ZERO, "bye")
            .disconnect_at(Duration::ZERO);

        assert!(channel.data_available().unwrap());
        assert_eq!(channel.receive(64).unwrap(), b"bye");
        assert!(channel.data_available().is_err());
        assert!(channel.send(b"x\n").await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_counted() {
        let mut channel = ScriptedChannel::new();
        let handle = channel.handle();
        channel.close().await.unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.close_count(), 1);
    }
}
