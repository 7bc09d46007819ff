//! Transport collaborators.
//!
//! The session driver only needs an already-open interactive byte channel.
//! [`ShellChannel`] is that contract; [`Connector`] produces one for a host.
//! [`SshConnector`] is the russh-backed implementation and
//! [`ScriptedChannel`] a timed, scriptable stand-in for tests.

pub mod config;
pub mod scripted;
mod ssh;

use std::future::Future;

pub use config::{AuthMethod, Credentials, HostKeyVerification, SshConfig};
pub use scripted::{Reaction, ScriptHandle, ScriptedChannel};
pub use ssh::{SshChannel, SshConnector};

use crate::error::Result;

/// A bidirectional interactive byte channel (a remote shell).
///
/// `data_available` and `receive` never block. Once the remote side has
/// closed and all buffered bytes were drained they return an error.
pub trait ShellChannel: Send {
    /// Write bytes to the remote shell.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Whether bytes are ready to be received.
    fn data_available(&mut self) -> Result<bool>;

    /// Take up to `max_bytes` of buffered output. Returns an empty vector if
    /// nothing is ready.
    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>>;

    /// Release the channel.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens interactive channels to hosts. Authentication and host-key policy
/// live here, never in the driver.
pub trait Connector: Send + Sync {
    /// The channel type this connector produces.
    type Channel: ShellChannel + 'static;

    /// Connect and authenticate to `host`, returning an interactive shell.
    fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Channel>> + Send;
}
