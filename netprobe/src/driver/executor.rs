//! Command executor facade.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use super::response::{CommandResult, Completion};
use super::session::{Session, SessionState};
use crate::error::{DriverError, Result};
use crate::platform::{PlatformDefinition, TimeoutPolicy};
use crate::transport::ShellChannel;

/// "Run this command, get clean text" on one open session.
///
/// The executor is cheap to clone and can be shared between tasks, but a
/// session carries one command at a time: a call made while another is
/// being collected fails immediately with [`DriverError::SessionBusy`]
/// instead of queueing behind it.
pub struct CommandExecutor<C: ShellChannel> {
    host: Arc<str>,
    platform: Arc<PlatformDefinition>,
    session: Arc<Mutex<Session<C>>>,
}

impl<C: ShellChannel> Clone for CommandExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            platform: Arc::clone(&self.platform),
            session: Arc::clone(&self.session),
        }
    }
}

impl<C: ShellChannel> CommandExecutor<C> {
    /// Wrap a ready session.
    pub fn new(session: Session<C>) -> Self {
        Self {
            host: Arc::from(session.host()),
            platform: Arc::clone(session.platform()),
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Execute `command` with the session's default timeouts.
    pub async fn execute(&self, command: &str) -> Result<CommandResult> {
        self.execute_with(command, None).await
    }

    /// Execute `command` with an explicit timeout budget.
    pub async fn execute_with(
        &self,
        command: &str,
        timeouts: Option<&TimeoutPolicy>,
    ) -> Result<CommandResult> {
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| DriverError::SessionBusy {
                host: self.host.to_string(),
            })?;
        session.execute(command, timeouts).await
    }

    /// Run a logical operation from the platform's command catalog.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # async fn example(
    /// #     executor: netprobe::CommandExecutor<netprobe::transport::SshChannel>,
    /// # ) -> Result<(), netprobe::Error> {
    /// let version = executor.run("software_version").await?;
    /// println!("{}", version.body);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, operation: &str) -> Result<CommandResult> {
        let spec = self
            .platform
            .command(operation)
            .ok_or_else(|| DriverError::UnknownCommand {
                name: operation.to_string(),
                platform: self.platform.name.clone(),
            })?;

        let result = self
            .execute_with(&spec.command, spec.timeouts.as_ref())
            .await?;

        if result.completion == Completion::Partial {
            if let Some(min_len) = spec.min_output_len {
                if result.passes_length_heuristic(min_len) {
                    debug!(
                        "{}: partial {} still has {} bytes (expected at least {})",
                        self.host,
                        operation,
                        result.body.len(),
                        min_len
                    );
                } else {
                    warn!(
                        "{}: partial {} is only {} bytes (expected at least {})",
                        self.host,
                        operation,
                        result.body.len(),
                        min_len
                    );
                }
            }
        }
        Ok(result)
    }

    /// Run several catalog operations in order, stopping at the first error.
    pub async fn run_all<S: AsRef<str>>(&self, operations: &[S]) -> Result<Vec<CommandResult>> {
        let mut results = Vec::with_capacity(operations.len());
        for operation in operations {
            results.push(self.run(operation.as_ref()).await?);
        }
        Ok(results)
    }

    /// Close the session, waiting for an in-flight command to finish first.
    pub async fn close(&self) -> Result<()> {
        self.session.lock().await.close().await
    }

    /// Current session state. Waits while a command is in flight.
    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    /// Device identity.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The device family of the session.
    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }
}

impl<C: ShellChannel> std::fmt::Debug for CommandExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("host", &self.host)
            .field("platform", &self.platform.name)
            .finish_non_exhaustive()
    }
}
