//! # netprobe
//!
//! Async interactive command-channel driver for network appliances.
//!
//! Devices such as Cisco IOS routers and F5 BIG-IP systems expose nothing
//! but a human-oriented terminal. netprobe drives that terminal over SSH:
//! it waits for the prompt, elevates privilege, turns off paging, sends a
//! command, collects output of unknown length under explicit timeouts and
//! returns the text with echo and prompt stripped.
//!
//! ## Features
//!
//! - Async SSH shells via russh
//! - Adaptive collection: prompt match, idle gap or hard deadline, whichever comes first
//! - Tail-window prompt detection with per-family signatures
//! - Explicit partial-result contract instead of guessing from byte counts
//! - Built-in `cisco_ios` and `f5_bigip` families with command catalogs
//! - Concurrent multi-device runs with isolated failures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netprobe::{Completion, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netprobe::Error> {
//!     let executor = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .enable_secret("enable-secret")
//!         .platform("cisco_ios")
//!         .connect()
//!         .await?;
//!
//!     let result = executor.execute("show version").await?;
//!     if result.completion == Completion::Partial {
//!         eprintln!("output may be truncated");
//!     }
//!     println!("{}", result.body);
//!
//!     executor.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

// Re-export main types for convenience
pub use driver::{
    CommandExecutor, CommandResult, Completion, Confidence, Session, SessionBuilder,
    SessionOptions, SessionState, SessionTimeouts,
};
pub use error::{Error, ErrorKind};
pub use platform::{CommandCatalog, CommandSpec, PlatformDefinition, PlatformRegistry, TimeoutPolicy};
pub use transport::{AuthMethod, Credentials, SshConfig};
