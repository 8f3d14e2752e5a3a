use std::collections::HashMap;
use std::sync::Arc;

use research_agent_model::ModelTool;
use serde_json::Value;

use crate::tool::Tool;
use crate::tool::object::{ToolObject, ToolObjectImpl, check_arguments};

/// Errors from registering or resolving tools.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A tool with the same name has already been registered.
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),
    /// No tool is registered under the name.
    #[error("tool `{0}` not found")]
    UnknownTool(String),
    /// The arguments don't match the declared schema of the tool.
    #[error("invalid arguments for tool `{tool}`: {reason}")]
    InvalidArguments {
        /// Name of the tool.
        tool: String,
        /// What is wrong with the arguments.
        reason: String,
    },
}

/// The set of tools available to the model.
///
/// The registry is built once at startup and is read-only afterwards, so
/// it can be shared across concurrent agent runs.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), RegistryError> {
        let name = tool.name().to_owned();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        debug!("registered tool: {name}");
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::new(ToolObjectImpl(tool)));
        Ok(())
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns `true` if a tool with the name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns tool names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name())
    }

    /// Returns the descriptors shown to the model, in registration order.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Checks the arguments of a call against the schema of the tool.
    ///
    /// Unknown tools pass the check, since calling them is a recoverable
    /// failure that [`ToolRegistry::invoke`] reports to the model.
    pub fn validate(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<(), RegistryError> {
        let Ok(tool) = self.get(name) else {
            return Ok(());
        };
        check_arguments(tool.parameter_schema(), arguments).map_err(|reason| {
            RegistryError::InvalidArguments {
                tool: name.to_owned(),
                reason,
            }
        })
    }

    /// Invokes a tool and returns its output.
    ///
    /// This never fails: an unknown tool, a tool error or even a panicking
    /// tool are all turned into an error string, which will be handed to
    /// the model like any other result.
    pub async fn invoke(&self, name: &str, arguments: Value) -> String {
        let tool = match self.get(name) {
            Ok(tool) => Arc::clone(tool),
            Err(err) => {
                warn!("{err}");
                return format!("Error: {err}");
            }
        };

        trace!("invoking tool `{name}` with args: {arguments:?}");
        // Run in a separate task, so a panicking tool won't take the agent
        // down with it.
        match tokio::spawn(tool.execute(arguments)).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                debug!("tool `{name}` failed: {err}");
                format!("Error: {err}")
            }
            Err(err) => {
                error!("tool `{name}` did not finish: {err}");
                format!("Error: tool `{name}` crashed while running")
            }
        }
    }

    fn get(&self, name: &str) -> Result<&Arc<dyn ToolObject>, RegistryError> {
        self.index
            .get(name)
            .map(|idx| &self.tools[*idx])
            .ok_or_else(|| RegistryError::UnknownTool(name.to_owned()))
    }
}
