//! A research assistant that combines web search, encyclopedia lookups and
//! file saving with a chat model.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring research functionality into your own apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod diagnostics;
mod session;
pub mod tools;

pub use config::{Config, ConfigError};
pub use session::{DEFAULT_SYSTEM_PROMPT, Session, SessionBuilder};

/// Re-exports of [`research_agent_core`] crate.
pub mod core {
    pub use research_agent_core::*;
}
