//! Device-family definitions.
//!
//! A [`PlatformDefinition`] bundles everything the session driver needs to
//! know about one family of devices: its prompt signature, the optional
//! privilege elevation dialog, the pagination-disable command and pager
//! markers, the shell its commands are written for, and a
//! [`CommandCatalog`] of logical operations with their timeout budgets.

mod catalog;
mod definition;
mod elevation;
mod registry;
mod shell;
pub mod vendors;

pub use catalog::{CommandCatalog, CommandSpec, TimeoutPolicy};
pub use definition::PlatformDefinition;
pub use elevation::Elevation;
pub use registry::PlatformRegistry;
pub use shell::ShellSwitch;
