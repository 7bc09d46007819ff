//! High-level driver for device interaction.
//!
//! The driver layer provides the session state machine, output
//! normalization and the [`CommandExecutor`] facade that callers use to run
//! commands and get clean text back.

mod builder;
mod executor;
pub mod fanout;
mod normalize;
pub(crate) mod response;
mod session;

pub use builder::SessionBuilder;
pub use executor::CommandExecutor;
pub use fanout::{DeviceReport, FleetJob, FleetSummary, ReportSink, run_fleet};
pub use normalize::Normalizer;
pub use response::{CommandResult, Completion, Confidence};
pub use session::{
    PaginationState, PrivilegeState, Session, SessionOptions, SessionState, SessionTimeouts,
};
