//! Session driver: the per-device state machine.
//!
//! A [`Session`] owns one interactive channel and walks it through
//! `Connecting -> AwaitingPrompt -> ElevatingPrivilege -> SuppressingPagination
//! -> Ready` (switching into the family's command shell while awaiting the
//! prompt, if it has one), then alternates between `Ready` and `Executing` until it is
//! closed. Any transport fault moves it to `Failed` and releases the channel.
//! The channel is released exactly once on every path.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use secrecy::{ExposeSecret, SecretString};

use super::normalize::Normalizer;
use super::response::{CommandResult, Completion};
use crate::channel::{PromptMatcher, ReadConfig, ReadResult, collect};
use crate::error::{DriverError, Error, Result};
use crate::platform::{PlatformDefinition, ShellSwitch, TimeoutPolicy};
use crate::transport::ShellChannel;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    AwaitingPrompt,
    ElevatingPrivilege,
    SuppressingPagination,
    Ready,
    Executing,
    Closed,
    Failed,
}

impl SessionState {
    /// Whether the session can never be used again.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingPrompt => "awaiting-prompt",
            SessionState::ElevatingPrivilege => "elevating-privilege",
            SessionState::SuppressingPagination => "suppressing-pagination",
            SessionState::Ready => "ready",
            SessionState::Executing => "executing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Privilege mode of the session, as read from the last prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegeState {
    Unprivileged,
    Privileged,
}

/// Whether paged output has been turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationState {
    Unknown,
    Disabled,
}

/// Timing knobs for every phase of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Wait after the channel opens before the first read.
    pub settle_delay: Duration,

    /// Budget for each prompt-detection attempt of the handshake.
    pub handshake: TimeoutPolicy,

    /// Budget for each step of the elevation dialog.
    pub elevation: TimeoutPolicy,

    /// Budget for draining the pagination-disable echo.
    pub pagination: TimeoutPolicy,

    /// Default budget for commands without their own policy.
    pub command: TimeoutPolicy,

    /// Sleep between availability checks.
    pub poll_interval: Duration,

    /// Maximum bytes requested per receive call.
    pub chunk_size: usize,

    /// How many trailing bytes are searched for a prompt.
    pub search_depth: usize,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            handshake: TimeoutPolicy::from_secs_millis(10, 1_000),
            elevation: TimeoutPolicy::from_secs_millis(10, 1_000),
            pagination: TimeoutPolicy::from_secs_millis(5, 500),
            command: TimeoutPolicy::from_secs_millis(30, 2_000),
            poll_interval: Duration::from_millis(100),
            chunk_size: 65535,
            search_depth: 1000,
        }
    }
}

impl SessionTimeouts {
    /// Reader settings for one pass under `policy`.
    pub fn read_config(&self, policy: &TimeoutPolicy) -> ReadConfig {
        ReadConfig {
            overall_timeout: policy.overall,
            idle_timeout: policy.idle,
            chunk_size: self.chunk_size,
            poll_interval: self.poll_interval,
            search_depth: self.search_depth,
        }
    }
}

/// Per-session behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub timeouts: SessionTimeouts,

    /// Run the elevation dialog when the session lands unprivileged.
    pub elevate: bool,

    /// Send the platform's pagination-disable command during setup.
    pub suppress_pagination: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeouts: SessionTimeouts::default(),
            elevate: true,
            suppress_pagination: true,
        }
    }
}

/// An interactive session to exactly one device.
///
/// Commands run one at a time (`execute` takes `&mut self`). Call
/// [`close`](Session::close) when done; dropping an open session releases the
/// channel without the polite close command and logs a warning.
pub struct Session<C: ShellChannel> {
    host: String,
    platform: Arc<PlatformDefinition>,
    options: SessionOptions,
    enable_secret: Option<SecretString>,
    channel: Option<C>,
    state: SessionState,
    privilege: PrivilegeState,
    pagination: PaginationState,
    prompt: String,
    command_prefix: Option<String>,
    normalizer: Normalizer,
}

impl<C: ShellChannel> Session<C> {
    /// Take ownership of an open channel and bring the session to `Ready`.
    ///
    /// # Errors
    ///
    /// [`DriverError::PromptNotRecognized`] if no prompt appears even after
    /// one nudge, [`DriverError::ElevationFailed`] if the elevation dialog
    /// fails, or a channel error if the transport drops. In every case the
    /// channel has been released when this returns.
    pub async fn open(
        host: impl Into<String>,
        platform: Arc<PlatformDefinition>,
        channel: C,
        enable_secret: Option<SecretString>,
        options: SessionOptions,
    ) -> Result<Self> {
        let normalizer = Normalizer::new(&platform);
        let mut session = Self {
            host: host.into(),
            platform,
            options,
            enable_secret,
            channel: Some(channel),
            state: SessionState::Connecting,
            privilege: PrivilegeState::Unprivileged,
            pagination: PaginationState::Unknown,
            prompt: String::new(),
            command_prefix: None,
            normalizer,
        };

        if let Err(e) = session.establish().await {
            session.fail(&e).await;
            return Err(e);
        }
        Ok(session)
    }

    /// Send `command` and collect its output until the prompt returns or a
    /// timeout fires.
    ///
    /// `timeouts` overrides the session's default command budget. Timeouts
    /// are not errors: they yield a [`Completion::Partial`] result.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotReady`] outside the `Ready` state. Transport faults
    /// fail the session and release the channel; no result is returned for
    /// the interrupted command.
    ///
    /// If an earlier `execute` future was dropped before it finished, the
    /// session is failed and [`DriverError::Interrupted`] is returned.
    pub async fn execute(
        &mut self,
        command: &str,
        timeouts: Option<&TimeoutPolicy>,
    ) -> Result<CommandResult> {
        if self.state == SessionState::Executing {
            let err = self.interrupted();
            self.fail(&err).await;
            return Err(err);
        }
        if self.state != SessionState::Ready {
            return Err(self.not_ready());
        }

        let policy = timeouts.copied().unwrap_or(self.options.timeouts.command);
        let config = self.options.timeouts.read_config(&policy);
        let platform = Arc::clone(&self.platform);

        let sent = self.prefixed(command);

        self.transition(SessionState::Executing);
        debug!("{}: executing {:?} (budget {:?}/{:?})", self.host, sent, policy.overall, policy.idle);

        let read = match self.send_and_collect(&sent, &config, &platform.prompt).await {
            Ok(read) => read,
            Err(e) => {
                self.fail(&e).await;
                return Err(e);
            }
        };

        if let Some(prompt) = &read.prompt {
            self.set_prompt(prompt.clone());
        }
        self.transition(SessionState::Ready);

        let result = self.normalizer.normalize(&self.host, command, &sent, read);
        match result.completion {
            Completion::Partial => warn!(
                "{}: {:?} ended on {:?} after {:?} without a prompt, result is partial ({} bytes)",
                self.host,
                command,
                result.outcome,
                result.elapsed,
                result.body.len()
            ),
            Completion::Error => warn!(
                "{}: {:?} rejected by device: {}",
                self.host,
                command,
                result.failure_message.as_deref().unwrap_or_default()
            ),
            Completion::Complete | Completion::Empty => debug!(
                "{}: {:?} {:?} in {:?}",
                self.host, command, result.completion, result.elapsed
            ),
        }
        Ok(result)
    }

    /// Politely end the session and release the channel.
    ///
    /// Idempotent: closing a closed or failed session does nothing. A
    /// session whose last command was abandoned is failed instead, since its
    /// shell may still be busy.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Executing {
            let err = self.interrupted();
            self.fail(&err).await;
            return Ok(());
        }
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };

        if let Some(command) = &self.platform.close_command {
            let line = format!("{}{}", command, self.platform.line_terminator);
            if let Err(e) = channel.send(line.as_bytes()).await {
                debug!("{}: close command not delivered: {}", self.host, e);
            }
        }

        let released = channel.close().await;
        self.transition(SessionState::Closed);
        info!("{}: session closed", self.host);
        released
    }

    /// Device identity.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The device family driving this session.
    pub fn platform(&self) -> &Arc<PlatformDefinition> {
        &self.platform
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Privilege mode as of the last prompt.
    pub fn privilege(&self) -> PrivilegeState {
        self.privilege
    }

    /// Whether pagination has been disabled.
    pub fn pagination(&self) -> PaginationState {
        self.pagination
    }

    /// The last prompt seen.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Prefix put in front of every command, when the command shell could
    /// not be entered.
    pub fn command_prefix(&self) -> Option<&str> {
        self.command_prefix.as_deref()
    }

    /// Whether the session accepts commands.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    async fn establish(&mut self) -> Result<()> {
        let platform = Arc::clone(&self.platform);

        self.transition(SessionState::AwaitingPrompt);
        tokio::time::sleep(self.options.timeouts.settle_delay).await;

        let config = self
            .options
            .timeouts
            .read_config(&self.options.timeouts.handshake);

        let mut greeting = self.read(&config, &platform.prompt).await?;
        if !greeting.outcome.is_prompt() {
            warn!(
                "{}: no prompt after {:?} ({:?}, {} bytes), sending a blank line",
                self.host,
                greeting.elapsed,
                greeting.outcome,
                greeting.data.len()
            );
            self.send_line("").await?;
            greeting = self.read(&config, &platform.prompt).await?;
        }

        let Some(prompt) = greeting.prompt else {
            return Err(DriverError::PromptNotRecognized {
                host: self.host.clone(),
            }
            .into());
        };
        self.set_prompt(prompt);
        debug!("{}: prompt {:?} ({:?})", self.host, self.prompt, self.privilege);

        if let Some(shell) = &platform.shell {
            self.enter_shell(shell, &platform).await?;
        }
        if self.privilege == PrivilegeState::Unprivileged && self.options.elevate {
            self.elevate(&platform).await?;
        }
        if self.options.suppress_pagination {
            self.suppress_pagination(&platform).await?;
        }

        self.transition(SessionState::Ready);
        info!(
            "{}: session ready ({}, {:?})",
            self.host, platform.name, self.privilege
        );
        Ok(())
    }

    async fn enter_shell(&mut self, shell: &ShellSwitch, platform: &PlatformDefinition) -> Result<()> {
        if shell.is_target(&self.prompt) {
            return Ok(());
        }

        let config = self
            .options
            .timeouts
            .read_config(&self.options.timeouts.handshake);

        for command in &shell.enter_commands {
            self.send_line(command).await?;
            let reply = self.read(&config, &platform.prompt).await?;
            match reply.prompt {
                Some(prompt) if shell.is_target(&prompt) => {
                    debug!("{}: {:?} entered the command shell", self.host, command);
                    self.set_prompt(prompt);
                    return Ok(());
                }
                Some(prompt) => {
                    debug!("{}: {:?} left us at {:?}", self.host, command, prompt);
                    self.set_prompt(prompt);
                }
                None => debug!("{}: no prompt after {:?} ({:?})", self.host, command, reply.outcome),
            }
        }

        let Some(prefix) = &shell.command_prefix else {
            return Err(DriverError::PromptNotRecognized {
                host: self.host.clone(),
            }
            .into());
        };
        warn!(
            "{}: command shell not reachable from {:?}, prefixing commands with {:?}",
            self.host, self.prompt, prefix
        );
        self.command_prefix = Some(prefix.clone());
        Ok(())
    }

    async fn elevate(&mut self, platform: &PlatformDefinition) -> Result<()> {
        let Some(elevation) = &platform.elevation else {
            return Ok(());
        };

        self.transition(SessionState::ElevatingPrivilege);
        let dialog = elevation.dialog_signature(&platform.prompt);
        let config = self
            .options
            .timeouts
            .read_config(&self.options.timeouts.elevation);

        self.send_line(&elevation.command).await?;
        let reply = self.read(&config, &dialog).await?;
        let mut prompt = reply
            .prompt
            .ok_or_else(|| self.elevation_failed("no prompt after the elevation command"))?;

        if elevation.is_secret_prompt(&prompt) {
            let Some(secret) = self.enable_secret.take() else {
                return Err(self.elevation_failed("secret requested but none was supplied"));
            };
            debug!("{}: sending elevation secret <hidden>", self.host);
            let sent = self.send_secret(&secret).await;
            self.enable_secret = Some(secret);
            sent?;

            let reply = self.read(&config, &dialog).await?;
            prompt = reply
                .prompt
                .ok_or_else(|| self.elevation_failed("no prompt after the elevation secret"))?;

            if elevation.is_secret_prompt(&prompt) {
                return Err(self.elevation_failed("elevation secret rejected"));
            }
        }

        if !elevation.is_privileged(&prompt) {
            return Err(self.elevation_failed("privileged prompt not reached"));
        }
        self.set_prompt(prompt);
        Ok(())
    }

    async fn suppress_pagination(&mut self, platform: &PlatformDefinition) -> Result<()> {
        if self.pagination == PaginationState::Disabled {
            return Ok(());
        }
        let Some(command) = platform.pagination_command.as_deref() else {
            return Ok(());
        };

        self.transition(SessionState::SuppressingPagination);
        let config = self
            .options
            .timeouts
            .read_config(&self.options.timeouts.pagination);

        let line = self.prefixed(command);
        self.send_line(&line).await?;
        let drained = self.read(&config, &platform.prompt).await?;
        trace!(
            "{}: drained {} bytes after pagination command ({:?})",
            self.host,
            drained.data.len(),
            drained.outcome
        );
        if let Some(prompt) = drained.prompt {
            self.set_prompt(prompt);
        }

        self.pagination = PaginationState::Disabled;
        Ok(())
    }

    async fn send_and_collect<M>(
        &mut self,
        command: &str,
        config: &ReadConfig,
        stop: &M,
    ) -> Result<ReadResult>
    where
        M: PromptMatcher + ?Sized,
    {
        self.discard_stale()?;
        self.send_line(command).await?;
        self.read(config, stop).await
    }

    /// Drop output left over from an earlier command that ended on a timeout.
    fn discard_stale(&mut self) -> Result<()> {
        let chunk_size = self.options.timeouts.chunk_size;
        let channel = self.channel_mut()?;
        let mut stale = 0;
        while channel.data_available()? {
            let chunk = channel.receive(chunk_size)?;
            if chunk.is_empty() {
                break;
            }
            stale += chunk.len();
        }
        if stale > 0 {
            debug!("{}: discarded {} stale bytes", self.host, stale);
        }
        Ok(())
    }

    async fn read<M>(&mut self, config: &ReadConfig, stop: &M) -> Result<ReadResult>
    where
        M: PromptMatcher + ?Sized,
    {
        let channel = self.channel_mut()?;
        collect(channel, config, stop).await
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut payload = String::with_capacity(line.len() + self.platform.line_terminator.len());
        payload.push_str(line);
        payload.push_str(&self.platform.line_terminator);

        trace!("{}: send {:?}", self.host, line);
        self.channel_mut()?.send(payload.as_bytes()).await
    }

    async fn send_secret(&mut self, secret: &SecretString) -> Result<()> {
        let payload = SecretString::from(format!(
            "{}{}",
            secret.expose_secret(),
            self.platform.line_terminator
        ));
        self.channel_mut()?
            .send(payload.expose_secret().as_bytes())
            .await
    }

    fn prefixed(&self, command: &str) -> String {
        match &self.command_prefix {
            Some(prefix) => format!("{prefix}{command}"),
            None => command.to_string(),
        }
    }

    fn channel_mut(&mut self) -> Result<&mut C> {
        self.channel.as_mut().ok_or_else(|| {
            DriverError::NotReady {
                host: self.host.clone(),
                state: self.state.to_string(),
            }
            .into()
        })
    }

    fn set_prompt(&mut self, prompt: String) {
        self.privilege = if self.platform.is_privileged_prompt(&prompt) {
            PrivilegeState::Privileged
        } else {
            PrivilegeState::Unprivileged
        };
        self.prompt = prompt;
    }

    fn transition(&mut self, next: SessionState) {
        debug!("{}: {} -> {}", self.host, self.state, next);
        self.state = next;
    }

    fn not_ready(&self) -> Error {
        DriverError::NotReady {
            host: self.host.clone(),
            state: self.state.to_string(),
        }
        .into()
    }

    fn interrupted(&self) -> Error {
        DriverError::Interrupted {
            host: self.host.clone(),
        }
        .into()
    }

    fn elevation_failed(&self, reason: &str) -> Error {
        DriverError::ElevationFailed {
            host: self.host.clone(),
            reason: reason.to_string(),
        }
        .into()
    }

    /// Enter `Failed` and release the channel.
    async fn fail(&mut self, err: &Error) {
        warn!("{}: session failed while {}: {}", self.host, self.state, err);
        self.transition(SessionState::Failed);
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                debug!("{}: error releasing channel: {}", self.host, e);
            }
        }
    }
}

impl<C: ShellChannel> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("platform", &self.platform.name)
            .field("state", &self.state)
            .field("privilege", &self.privilege)
            .field("pagination", &self.pagination)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

impl<C: ShellChannel> Drop for Session<C> {
    fn drop(&mut self) {
        if self.channel.is_some() {
            warn!(
                "{}: session dropped without close(), releasing channel",
                self.host
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::channel::ReadOutcome;
    use crate::driver::response::Confidence;
    use crate::error::ErrorKind;
    use crate::platform::vendors::{cisco_ios, f5_bigip};
    use crate::transport::{Reaction, ScriptedChannel};

    const VERSION: &str = "Cisco IOS Software, C2900 Software (C2900-UNIVERSALK9-M), Version 15.2(4)M7\r\n\
                           ROM: System Bootstrap, Version 15.0(1r)M16\r\n\
                           Router uptime is 2 weeks, 3 days\r\n";

    /// An IOS device that answers the full setup dialog.
    fn ios_device() -> ScriptedChannel {
        ScriptedChannel::new()
            .output_at(Duration::ZERO, "\r\nRouter>")
            .respond("enable", "Password: ")
            .respond("s3cret", "\r\nRouter#")
            .respond("terminal length 0", "\r\nRouter#")
    }

    async fn open_ios(channel: ScriptedChannel) -> Result<Session<ScriptedChannel>> {
        Session::open(
            "r1",
            Arc::new(cisco_ios::platform()),
            channel,
            Some(SecretString::from("s3cret".to_string())),
            SessionOptions::default(),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_prompt_needs_no_nudge() {
        let channel = ios_device();
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.privilege(), PrivilegeState::Privileged);
        assert_eq!(session.pagination(), PaginationState::Disabled);
        assert_eq!(session.prompt(), "Router#");
        assert_eq!(
            handle.sent_lines(),
            vec!["enable", "s3cret", "terminal length 0"]
        );
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_banner_is_awaited() {
        let channel = ScriptedChannel::new()
            .output_at(Duration::from_secs(2), "\r\nRouter>")
            .respond("enable", "Password: ")
            .respond("s3cret", "\r\nRouter#")
            .respond("terminal length 0", "\r\nRouter#");
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);

        assert!(session.is_ready());
        assert!(!handle.sent_lines().iter().any(String::is_empty));
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_recovers_silent_device() {
        let channel = ScriptedChannel::new()
            .respond("", "\r\nRouter#")
            .respond("terminal length 0", "\r\nRouter#");
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);

        assert!(session.is_ready());
        assert_eq!(handle.sent_lines(), vec!["", "terminal length 0"]);
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_prompt_is_terminal() {
        let channel = ScriptedChannel::new().output_at(Duration::ZERO, "Welcome to the jump host\r\n");
        let handle = channel.handle();

        let start = Instant::now();
        let err = assert_err!(open_ios(channel).await);

        assert_eq!(err.kind(), ErrorKind::PromptNotRecognized);
        assert_eq!(handle.sent_lines(), vec![""]);
        assert_eq!(handle.close_count(), 1);
        // settle + two bounded attempts
        assert!(start.elapsed() <= Duration::from_secs(21) + Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_version_is_complete() {
        let channel = ios_device().respond("show version", &format!("{VERSION}Router#"));

        let mut session = assert_ok!(open_ios(channel).await);
        let result = assert_ok!(session.execute("show version", None).await);

        assert_eq!(result.completion, Completion::Complete);
        assert_eq!(result.confidence(), Confidence::High);
        assert_eq!(result.outcome, ReadOutcome::PromptDetected);
        assert!(result.body.starts_with("Cisco IOS Software"));
        assert!(result.body.ends_with("Router uptime is 2 weeks, 3 days"));
        assert!(!result.body.contains("show version"));
        assert!(!result.body.contains("Router#"));
        assert_eq!(result.host, "r1");
        assert_eq!(session.state(), SessionState::Ready);
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_pager_gives_partial_result() {
        let channel = ios_device().on_line(
            "show tech-support",
            Reaction::new().stream_every(Duration::from_millis(200), 1_000, "-- data --\r\n"),
        );
        let policy = TimeoutPolicy::from_secs_millis(5, 2_000);

        let mut session = assert_ok!(open_ios(channel).await);
        let result = assert_ok!(session.execute("show tech-support", Some(&policy)).await);

        assert_eq!(result.completion, Completion::Partial);
        assert_eq!(result.outcome, ReadOutcome::OverallTimeout);
        assert_eq!(result.confidence(), Confidence::Low);

        // Everything collected before the deadline, minus the echo
        let collected = result.raw.strip_prefix("show tech-support\r\n").unwrap();
        let expected = collected.replace("\r\n", "\n");
        assert_eq!(result.body, expected.trim_end());
        assert!(result.body.lines().all(|line| line == "-- data --"));
        assert!(result.body.lines().count() >= 24);
        assert!(result.elapsed <= policy.overall + Duration::from_millis(100));
        assert_eq!(session.state(), SessionState::Ready);
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_secret_fails_elevation() {
        let channel = ScriptedChannel::new()
            .output_at(Duration::ZERO, "\r\nRouter>")
            .respond("enable", "Password: ")
            .respond("s3cret", "\r\nPassword: ");
        let handle = channel.handle();

        let err = assert_err!(open_ios(channel).await);

        assert_eq!(err.kind(), ErrorKind::ElevationFailed);
        assert!(!err.to_string().contains("s3cret"));
        assert_eq!(handle.close_count(), 1);
        // Not retried
        assert_eq!(handle.sent_lines(), vec!["enable", "s3cret"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_secret_fails_elevation() {
        let channel = ScriptedChannel::new()
            .output_at(Duration::ZERO, "\r\nRouter>")
            .respond("enable", "Password: ");
        let handle = channel.handle();

        let err = assert_err!(
            Session::open(
                "r1",
                Arc::new(cisco_ios::platform()),
                channel,
                None,
                SessionOptions::default(),
            )
            .await
        );

        assert_eq!(err.kind(), ErrorKind::ElevationFailed);
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elevation_can_be_skipped() {
        let channel = ScriptedChannel::new()
            .output_at(Duration::ZERO, "\r\nRouter>")
            .respond("terminal length 0", "\r\nRouter>");
        let handle = channel.handle();
        let options = SessionOptions {
            elevate: false,
            ..SessionOptions::default()
        };

        let mut session = assert_ok!(
            Session::open("r1", Arc::new(cisco_ios::platform()), channel, None, options).await
        );

        assert_eq!(session.privilege(), PrivilegeState::Unprivileged);
        assert_eq!(handle.sent_lines(), vec!["terminal length 0"]);
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_command_fails_session() {
        let channel = ios_device().on_line(
            "show running-config",
            Reaction::new()
                .output_after(Duration::ZERO, "Building configuration...\r\n")
                .disconnect_after(Duration::from_millis(500)),
        );
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);
        let err = assert_err!(session.execute("show running-config", None).await);

        assert_eq!(err.kind(), ErrorKind::TransportLost);
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(handle.close_count(), 1);

        // Released exactly once, whatever the caller does next
        let err = assert_err!(session.execute("show version", None).await);
        assert!(matches!(err, Error::Driver(DriverError::NotReady { .. })));
        assert_ok!(session.close().await);
        assert_eq!(handle.close_count(), 1);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_polite_and_idempotent() {
        let channel = ios_device();
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);
        assert_ok!(session.close().await);
        assert_ok!(session.close().await);

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(handle.close_count(), 1);
        assert_eq!(handle.sent_lines().last().map(String::as_str), Some("exit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_sent_once() {
        let channel = ios_device()
            .respond("show clock", "*10:00:00.000 UTC Mon Mar 1 2027\r\nRouter#")
            .respond("show version", &format!("{VERSION}Router#"));
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);
        assert_ok!(session.execute("show clock", None).await);
        assert_ok!(session.execute("show version", None).await);

        let pagination = handle
            .sent_lines()
            .iter()
            .filter(|line| line.as_str() == "terminal length 0")
            .count();
        assert_eq!(pagination, 1);
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_script_same_result() {
        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let channel = ios_device().respond("show version", &format!("{VERSION}Router#"));
            let mut session = assert_ok!(open_ios(channel).await);
            let result = assert_ok!(session.execute("show version", None).await);
            outcomes.push((result.body, result.completion, result.outcome));
            assert_ok!(session.close().await);
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_output_is_discarded() {
        let channel = ios_device()
            .on_line(
                "show logging",
                Reaction::new()
                    .output_after(Duration::ZERO, "log line 1\r\n")
                    .output_after(Duration::from_secs(4), "late log line\r\nRouter#"),
            )
            .respond("show clock", "*10:00:00.000 UTC\r\nRouter#");
        let policy = TimeoutPolicy::from_secs_millis(10, 1_000);

        let mut session = assert_ok!(open_ios(channel).await);
        let first = assert_ok!(session.execute("show logging", Some(&policy)).await);
        assert_eq!(first.completion, Completion::Partial);
        assert_eq!(first.outcome, ReadOutcome::IdleTimeout);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let second = assert_ok!(session.execute("show clock", None).await);
        assert_eq!(second.body, "*10:00:00.000 UTC");
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_command_fails_next_execute() {
        let channel = ios_device()
            .on_line(
                "show tech-support",
                Reaction::new().stream_every(Duration::from_millis(200), 125, "-- data --\r\n"),
            )
            .respond("show clock", "*10:00:00.000 UTC\r\nRouter#");
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);
        let abandoned =
            tokio::time::timeout(Duration::from_secs(2), session.execute("show tech-support", None)).await;
        assert_err!(abandoned);
        assert_eq!(session.state(), SessionState::Executing);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let err = assert_err!(session.execute("show clock", None).await);

        assert!(matches!(err, Error::Driver(DriverError::Interrupted { .. })));
        assert_eq!(err.kind(), ErrorKind::TransportLost);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(handle.close_count(), 1);
        assert!(!handle.sent_lines().iter().any(|l| l == "show clock"));

        assert_ok!(session.close().await);
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_after_abandoned_command() {
        let channel = ios_device().on_line(
            "show tech-support",
            Reaction::new().stream_every(Duration::from_millis(200), 125, "-- data --\r\n"),
        );
        let handle = channel.handle();

        let mut session = assert_ok!(open_ios(channel).await);
        let abandoned =
            tokio::time::timeout(Duration::from_secs(2), session.execute("show tech-support", None)).await;
        assert_err!(abandoned);

        assert_ok!(session.close().await);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(handle.close_count(), 1);
        // No polite exit into a busy shell
        assert!(!handle.sent_lines().iter().any(|l| l == "exit"));
    }

    const TMSH_PROMPT: &str = "admin@(bigip1)(cfg-sync Standalone)(Active)(/Common)(tmos)# ";
    const BASH_PROMPT: &str = "[admin@bigip1:Active:Standalone] ~ # ";
    const PAGER_OFF: &str = "modify cli preference pager disabled display-threshold 0";
    const HARDWARE: &str = "Sys::Hardware\r\nChassis Information\r\n  Chassis Name  BIG-IP 4000\r\n";

    #[tokio::test(start_paused = true)]
    async fn test_f5_session_without_elevation() {
        let prompt = TMSH_PROMPT;
        let channel = ScriptedChannel::new()
            .output_at(Duration::ZERO, &format!("Last login: Mon Mar 1\r\n{prompt}"))
            .respond(
                "modify cli preference pager disabled display-threshold 0",
                &format!("\r\n{prompt}"),
            )
            .respond(
                "show sys hardware",
                &format!("Sys::Hardware\r\nChassis Information\r\n  Chassis Name  BIG-IP 4000\r\n{prompt}"),
            );
        let handle = channel.handle();
        let platform = Arc::new(f5_bigip::platform());
        let policy = platform.command("hardware_inventory").and_then(|c| c.timeouts);

        let mut session = assert_ok!(
            Session::open("lb1", platform, channel, None, SessionOptions::default()).await
        );
        assert_eq!(session.privilege(), PrivilegeState::Privileged);

        let result = assert_ok!(session.execute("show sys hardware", policy.as_ref()).await);
        assert_eq!(result.completion, Completion::Complete);
        assert_eq!(
            result.body,
            "Sys::Hardware\nChassis Information\n  Chassis Name  BIG-IP 4000"
        );
        assert_ok!(session.close().await);
        assert!(!handle.sent_lines().iter().any(|l| l == "enable"));
        // Already in tmsh
        assert!(!handle.sent_lines().iter().any(|l| l == "tmsh"));
        assert!(session.command_prefix().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_f5_bash_landing_enters_tmsh() {
        let channel = ScriptedChannel::new()
            .output_at(Duration::ZERO, &format!("Last login: Mon Mar 1\r\n{BASH_PROMPT}"))
            .respond("tmsh", &format!("\r\n{TMSH_PROMPT}"))
            .respond(PAGER_OFF, &format!("\r\n{TMSH_PROMPT}"))
            .respond("show sys hardware", &format!("{HARDWARE}{TMSH_PROMPT}"));
        let handle = channel.handle();

        let mut session = assert_ok!(
            Session::open("lb1", Arc::new(f5_bigip::platform()), channel, None, SessionOptions::default()).await
        );
        assert_eq!(session.prompt(), TMSH_PROMPT.trim());
        assert!(session.command_prefix().is_none());

        let result = assert_ok!(session.execute("show sys hardware", None).await);
        assert_eq!(result.completion, Completion::Complete);
        assert_eq!(
            result.body,
            "Sys::Hardware\nChassis Information\n  Chassis Name  BIG-IP 4000"
        );
        assert_eq!(
            handle.sent_lines(),
            vec!["tmsh", PAGER_OFF, "show sys hardware"]
        );
        assert_ok!(session.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_f5_bash_without_tmsh_prefixes_commands() {
        let channel = ScriptedChannel::new()
            .output_at(Duration::ZERO, &format!("Last login: Mon Mar 1\r\n{BASH_PROMPT}"))
            .respond("tmsh", &format!("-bash: tmsh: command not found\r\n{BASH_PROMPT}"))
            .respond(&format!("tmsh {PAGER_OFF}"), &format!("\r\n{BASH_PROMPT}"))
            .respond("tmsh show sys hardware", &format!("{HARDWARE}{BASH_PROMPT}"));
        let handle = channel.handle();

        let mut session = assert_ok!(
            Session::open("lb1", Arc::new(f5_bigip::platform()), channel, None, SessionOptions::default()).await
        );
        assert_eq!(session.command_prefix(), Some("tmsh "));
        assert_eq!(session.pagination(), PaginationState::Disabled);

        let result = assert_ok!(session.execute("show sys hardware", None).await);
        assert_eq!(result.command, "show sys hardware");
        assert_eq!(result.completion, Completion::Complete);
        assert_eq!(
            result.body,
            "Sys::Hardware\nChassis Information\n  Chassis Name  BIG-IP 4000"
        );
        assert_eq!(
            handle.sent_lines(),
            vec![
                "tmsh".to_string(),
                format!("tmsh {PAGER_OFF}"),
                "tmsh show sys hardware".to_string(),
            ]
        );
        assert_ok!(session.close().await);
    }
}
