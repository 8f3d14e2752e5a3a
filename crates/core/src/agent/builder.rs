use std::sync::Arc;

use research_agent_model::ModelProvider;

use super::{Agent, DEFAULT_MAX_ITERATIONS, Observers, Stage};
use crate::history::Turn;
use crate::model_client::{ModelClient, RetryPolicy};
use crate::tool::{RegistryError, Tool, ToolRegistry};

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    tools: Arc<ToolRegistry>,
    max_iterations: Option<usize>,
    observers: Observers,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            tools: Default::default(),
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
            observers: Default::default(),
        }
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(
        mut self,
        tool: T,
    ) -> Result<Self, RegistryError> {
        Arc::make_mut(&mut self.tools).register(tool)?;
        Ok(self)
    }

    /// Replaces the tools with a prebuilt registry, which can be shared
    /// with other agents.
    #[inline]
    pub fn with_registry(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the maximum number of model calls in one run. `None` removes
    /// the limit.
    #[inline]
    pub fn with_max_iterations(
        mut self,
        max_iterations: Option<usize>,
    ) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets how failed model requests are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.model_client.set_retry_policy(retry_policy);
        self
    }

    /// Attaches a callback to be invoked when the run enters a new stage.
    #[inline]
    pub fn on_stage(
        mut self,
        on_stage: impl Fn(Stage) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_stage = Some(Arc::new(on_stage));
        self
    }

    /// Attaches a callback to be invoked when a turn is appended to the
    /// history.
    #[inline]
    pub fn on_turn(
        mut self,
        on_turn: impl Fn(&Turn) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_turn = Some(Arc::new(on_turn));
        self
    }

    /// Attaches a callback to receive text deltas while the model is
    /// generating.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        let AgentBuilder {
            model_client,
            tools,
            max_iterations,
            observers,
        } = self;
        Agent {
            model_client,
            tools,
            max_iterations,
            observers,
        }
    }
}
