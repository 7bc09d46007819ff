//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use futures_util::FutureExt;
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, Credentials, HostKeyVerification, SshConfig};
use super::{Connector, ShellChannel};
use crate::error::{ChannelError, Result, TransportError};

/// Opens interactive PTY shells over SSH.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    /// Create a connector with the given SSH settings.
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// The SSH settings in use.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, credentials: &Credentials) -> Result<()> {
        let user = credentials.username.as_str();
        let success = match &credentials.auth {
            AuthMethod::None => session
                .authenticate_none(user)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(user, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: user.to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Open a PTY session channel and start an interactive shell on it.
    async fn open_shell(&self, session: &Handle<SshHandler>) -> Result<Channel<Msg>> {
        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(|_| ChannelError::PtyOpenFailed)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }
}

impl Connector for SshConnector {
    type Channel = SshChannel;

    async fn connect(&self, host: &str, credentials: &Credentials) -> Result<SshChannel> {
        let ssh_config = Arc::new(client::Config {
            keepalive_interval: self.config.keepalive_interval,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: host.to_string(),
            port: self.config.port,
            host_key_verification: self.config.host_key_verification.clone(),
            known_hosts_path: self.config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}:{}", host, self.config.port);

        let mut session = tokio::time::timeout(
            self.config.timeout,
            client::connect(ssh_config, (host, self.config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic UnknownKey
            let stored = host_key_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            match (stored, e) {
                (Some(hk_err), _) => hk_err,
                (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                    host: host.to_string(),
                    port: self.config.port,
                    source,
                },
                (None, e) => TransportError::Ssh(e),
            }
        })?;

        Self::authenticate(&mut session, credentials).await?;

        let channel = self.open_shell(&session).await?;
        debug!("interactive shell open on {}", host);

        Ok(SshChannel {
            channel,
            session,
            pending: BytesMut::with_capacity(8192),
            eof: false,
        })
    }
}

/// An interactive shell on an SSH session.
///
/// Incoming messages are drained without blocking into a local buffer, so
/// the reader can poll for availability.
pub struct SshChannel {
    channel: Channel<Msg>,
    session: Handle<SshHandler>,
    pending: BytesMut,
    eof: bool,
}

impl SshChannel {
    /// Pull every message that is already queued on the channel.
    fn drain_ready(&mut self) {
        while !self.eof {
            match self.channel.wait().now_or_never() {
                Some(Some(ChannelMsg::Data { data })) => self.pending.extend_from_slice(&data),
                Some(Some(ChannelMsg::ExtendedData { data, .. })) => {
                    self.pending.extend_from_slice(&data)
                }
                Some(Some(ChannelMsg::Eof | ChannelMsg::Close)) | Some(None) => {
                    debug!("remote closed the shell channel");
                    self.eof = true;
                }
                Some(Some(_)) => {}
                None => break,
            }
        }
    }
}

impl ShellChannel for SshChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.eof {
            return Err(ChannelError::Closed.into());
        }
        self.channel.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    fn data_available(&mut self) -> Result<bool> {
        self.drain_ready();
        if !self.pending.is_empty() {
            Ok(true)
        } else if self.eof {
            Err(ChannelError::Closed.into())
        } else {
            Ok(false)
        }
    }

    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        self.drain_ready();
        if self.pending.is_empty() && self.eof {
            return Err(ChannelError::Closed.into());
        }
        let n = max_bytes.min(self.pending.len());
        Ok(self.pending.split_to(n).to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.eof {
            // Best effort; the disconnect below tears the channel down anyway
            let _ = self.channel.eof().await;
            let _ = self.channel.close().await;
            self.eof = true;
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(ChannelError::Ssh)?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        *self
            .host_key_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}
