//! Tools the model can call, and the registry dispatching to them.

mod error;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use registry::{RegistryError, ToolRegistry};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that the model can call by name.
///
/// A tool is configured once, registered in a
/// [`ToolRegistry`], and then shared by every query. Anything it needs at
/// run time (an output directory, an HTTP client, an endpoint) is set on
/// construction and cloned into the future returned by
/// [`execute`](Tool::execute).
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name the model calls the tool by.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    ///
    /// Arguments naming a property that this schema doesn't declare are
    /// rejected before the tool is executed.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the decoded input.
    ///
    /// The returned future is spawned onto its own task, so it must not
    /// borrow `self`. A failure is handed to the model as an error string.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
