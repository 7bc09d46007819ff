//! SSH connection configuration and credentials.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For testing and lab use only.
    Disabled,
}

/// Per-connection SSH settings shared by every host a connector talks to.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// SSH port (default: 22).
    pub port: u16,

    /// Bound on TCP connect plus SSH handshake.
    pub timeout: Duration,

    /// Interval between SSH keepalives on an open session.
    pub keepalive_interval: Option<Duration>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file. `None` uses `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: 22,
            timeout: Duration::from_secs(10),
            keepalive_interval: Some(Duration::from_secs(15)),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

/// Authentication method for SSH connections.
#[derive(Debug)]
pub enum AuthMethod {
    /// No authentication (for testing only).
    None,

    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

/// Resolved secret material for one device login.
///
/// Secrets stay wrapped for the lifetime of the session; their `Debug`
/// output is redacted.
#[derive(Debug)]
pub struct Credentials {
    /// Login user.
    pub username: String,

    /// How to authenticate the SSH session.
    pub auth: AuthMethod,

    /// Secret for privilege elevation (e.g. Cisco `enable`), if any.
    pub enable_secret: Option<SecretString>,
}

impl Credentials {
    /// Password login without an elevation secret.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth: AuthMethod::Password(SecretString::from(password.into())),
            enable_secret: None,
        }
    }

    /// Private key login.
    pub fn private_key(username: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            auth: AuthMethod::PrivateKey {
                path: path.into(),
                passphrase: None,
            },
            enable_secret: None,
        }
    }

    /// Set the elevation secret.
    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// A separately owned copy of the elevation secret, for one session.
    pub fn session_enable_secret(&self) -> Option<SecretString> {
        self.enable_secret
            .as_ref()
            .map(|s| SecretString::from(s.expose_secret().to_string()))
    }
}
