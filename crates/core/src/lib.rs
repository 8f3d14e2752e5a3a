//! Core logic including the agent loop, history, tool dispatch, etc.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod cancel;
pub mod history;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, DEFAULT_MAX_ITERATIONS, RunError, RunErrorKind,
    RunOutcome, RunStatus, Stage,
};
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use history::{History, HistoryError, Role, Turn};
pub use model_client::RetryPolicy;
pub use tool::{Tool, ToolRegistry};

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
