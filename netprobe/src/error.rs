//! Error types for netprobe.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netprobe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Transport layer errors raised while establishing a session.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// The server presented a different key than the one in known_hosts.
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Strict verification is on and the host is not in known_hosts.
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written.
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors on an already-open interactive channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open PTY channel
    #[error("Failed to open PTY channel")]
    PtyOpenFailed,

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),
}

/// Driver layer errors (session state machine, command execution).
#[derive(Error, Debug)]
pub enum DriverError {
    /// The initial handshake never produced a recognizable prompt.
    #[error("Prompt not recognized on {host}")]
    PromptNotRecognized { host: String },

    /// Privilege elevation was rejected or never reached the privileged prompt.
    #[error("Privilege elevation failed on {host}: {reason}")]
    ElevationFailed { host: String, reason: String },

    /// A command is already being collected on this session.
    #[error("Session to {host} is busy with another command")]
    SessionBusy { host: String },

    /// An earlier command was abandoned mid-collection. The shell is out of
    /// step with the session.
    #[error("Session to {host} was interrupted while a command was in flight")]
    Interrupted { host: String },

    /// The session is not in a state that accepts commands.
    #[error("Session to {host} is not ready (state: {state})")]
    NotReady { host: String, state: String },

    /// Logical operation missing from the platform's command catalog.
    #[error("Command '{name}' is not in the catalog for platform '{platform}'")]
    UnknownCommand { name: String, platform: String },

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Invalid platform definition
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },

    /// No platform registered under this name
    #[error("Unknown platform: {name}")]
    UnknownPlatform { name: String },

    /// A platform with this name is already registered
    #[error("Platform already registered: {name}")]
    AlreadyRegistered { name: String },
}

/// Coarse classification of a failure, as surfaced to callers and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport could not be established (network, credentials, host key).
    ConnectFailure,
    /// Handshake never produced a matching prompt.
    PromptNotRecognized,
    /// Elevation secret rejected or privileged prompt not reached.
    ElevationFailed,
    /// Another command was in flight on the same session.
    SessionBusy,
    /// The channel closed or errored mid-operation.
    TransportLost,
    /// Configuration, catalog or usage errors.
    Other,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::ConnectFailure,
            Error::Channel(_) => ErrorKind::TransportLost,
            Error::Driver(DriverError::PromptNotRecognized { .. }) => {
                ErrorKind::PromptNotRecognized
            }
            Error::Driver(DriverError::ElevationFailed { .. }) => ErrorKind::ElevationFailed,
            Error::Driver(DriverError::SessionBusy { .. }) => ErrorKind::SessionBusy,
            Error::Driver(DriverError::Interrupted { .. }) => ErrorKind::TransportLost,
            Error::Driver(_) | Error::Platform(_) => ErrorKind::Other,
        }
    }

    /// Whether the session this error came from can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectFailure
                | ErrorKind::PromptNotRecognized
                | ErrorKind::ElevationFailed
                | ErrorKind::TransportLost
        )
    }
}

/// Result type alias using netprobe's Error.
pub type Result<T> = std::result::Result<T, Error>;
