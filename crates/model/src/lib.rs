//! Provider-neutral types for talking to the chat model behind the
//! research agent.
//!
//! A [`ModelRequest`] carries the whole conversation plus the tools the
//! model may call, and a [`ModelProvider`] answers it with a streamed
//! [`ModelResponse`]. The types only describe the protocol; retrying,
//! assembling turns and the loop around them live in the core crate.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
