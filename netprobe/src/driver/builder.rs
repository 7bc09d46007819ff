//! Builder for opening device sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use super::executor::CommandExecutor;
use super::session::{Session, SessionOptions, SessionTimeouts};
use crate::error::{DriverError, Result};
use crate::platform::{PlatformDefinition, PlatformRegistry};
use crate::transport::config::{AuthMethod, Credentials, HostKeyVerification, SshConfig};
use crate::transport::{Connector, ShellChannel, SshChannel, SshConnector};

/// Builder for constructing device sessions.
///
/// # Example
///
/// ```rust,no_run
/// use netprobe::SessionBuilder;
///
/// # async fn example() -> Result<(), netprobe::Error> {
/// let executor = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .enable_secret("enable-secret")
///     .platform("cisco_ios")
///     .connect()
///     .await?;
///
/// let version = executor.run("software_version").await?;
/// println!("{}", version.body);
/// executor.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    username: Option<String>,
    auth: AuthMethod,
    enable_secret: Option<SecretString>,
    platform_name: Option<String>,
    custom_platform: Option<PlatformDefinition>,
    registry: Option<PlatformRegistry>,
    ssh: SshConfig,
    options: SessionOptions,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: None,
            auth: AuthMethod::None,
            enable_secret: None,
            platform_name: None,
            custom_platform: None,
            registry: None,
            ssh: SshConfig::default(),
            options: SessionOptions::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.ssh.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the privilege elevation secret.
    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the platform name (e.g., "cisco_ios", "f5_bigip").
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform_name = Some(platform.into());
        self
    }

    /// Set a custom platform definition.
    pub fn custom_platform(mut self, platform: PlatformDefinition) -> Self {
        self.custom_platform = Some(platform);
        self
    }

    /// Resolve platform names against `registry` instead of the built-ins.
    pub fn registry(mut self, registry: PlatformRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.ssh.timeout = timeout;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.ssh.terminal_width = width;
        self.ssh.terminal_height = height;
        self
    }

    /// Set host key verification mode (default: `AcceptNew`).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.ssh.host_key_verification = mode;
        self
    }

    /// Set a custom known_hosts file path.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh.known_hosts_path = Some(path.into());
        self
    }

    /// Set the session timeouts.
    pub fn timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.options.timeouts = timeouts;
        self
    }

    /// Turn the elevation dialog on or off (default: on).
    pub fn elevate(mut self, elevate: bool) -> Self {
        self.options.elevate = elevate;
        self
    }

    /// Turn pagination suppression on or off (default: on).
    pub fn suppress_pagination(mut self, suppress: bool) -> Self {
        self.options.suppress_pagination = suppress;
        self
    }

    /// Connect over SSH and bring the session to `Ready`.
    pub async fn connect(self) -> Result<CommandExecutor<SshChannel>> {
        let username = self.username.clone().ok_or_else(|| DriverError::InvalidConfig {
            message: "username is required".to_string(),
        })?;
        let platform = self.resolve_platform()?;
        let connector = SshConnector::new(self.ssh.clone());

        let credentials = Credentials {
            username,
            auth: self.auth,
            enable_secret: None,
        };
        let channel = connector.connect(&self.host, &credentials).await?;

        let session = Session::open(
            self.host,
            platform,
            channel,
            self.enable_secret,
            self.options,
        )
        .await?;
        Ok(CommandExecutor::new(session))
    }

    /// Drive an already-open channel instead of connecting.
    pub async fn open<C: ShellChannel>(self, channel: C) -> Result<CommandExecutor<C>> {
        let platform = self.resolve_platform()?;
        let session = Session::open(
            self.host,
            platform,
            channel,
            self.enable_secret,
            self.options,
        )
        .await?;
        Ok(CommandExecutor::new(session))
    }

    fn resolve_platform(&self) -> Result<Arc<PlatformDefinition>> {
        if let Some(custom) = &self.custom_platform {
            custom.validate()?;
            return Ok(Arc::new(custom.clone()));
        }

        let name = self
            .platform_name
            .as_deref()
            .ok_or_else(|| DriverError::InvalidConfig {
                message: "platform must be specified".to_string(),
            })?;

        match &self.registry {
            Some(registry) => registry.resolve(name),
            None => PlatformRegistry::with_builtins().resolve(name),
        }
    }
}
