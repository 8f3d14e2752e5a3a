use std::path::PathBuf;
use std::sync::Arc;

use research_agent_core::tool::RegistryError;
use research_agent_core::{
    Agent, AgentBuilder, CancelSignal, History, RunError, RunOutcome, Stage,
    ToolRegistry, Turn,
};
use research_agent_model::ModelProvider;
use research_agent_openai_model::OpenAIProvider;

use crate::config::Config;
use crate::tools::default_registry;

/// The instructions given to the model when no other prompt is set.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    system_prompt: String,
    output_dir: PathBuf,
    registry: Option<Arc<ToolRegistry>>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            output_dir: PathBuf::from("."),
            registry: None,
        }
    }

    /// Creates a session builder driven by the OpenAI-compatible provider
    /// described in `config`.
    pub fn from_config(config: &Config) -> Self {
        let provider = OpenAIProvider::new(config.openai_config());
        Self::with_model_provider(provider)
            .with_output_dir(config.output_dir.clone())
            .with_max_iterations(config.max_iterations)
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the directory that the save tool writes into.
    #[inline]
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Sets the maximum number of model calls per query.
    #[inline]
    pub fn with_max_iterations(
        mut self,
        max_iterations: Option<usize>,
    ) -> Self {
        self.agent_builder =
            self.agent_builder.with_max_iterations(max_iterations);
        self
    }

    /// Replaces the built-in tools.
    #[inline]
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Attaches a callback to be invoked when the agent enters a new stage.
    #[inline]
    pub fn on_stage(
        mut self,
        on_stage: impl Fn(Stage) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_stage(on_stage);
        self
    }

    /// Attaches a callback to be invoked when a turn is added.
    #[inline]
    pub fn on_turn(
        mut self,
        on_turn: impl Fn(&Turn) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_turn(on_turn);
        self
    }

    /// Attaches a callback to be invoked when a transcript is generated.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_transcript(on_transcript);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Result<Session, RegistryError> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(default_registry(self.output_dir)?),
        };
        let agent = self.agent_builder.with_registry(registry).build();
        debug!(
            "session ready with model `{}` and tools: {:?}",
            agent.model_name(),
            agent.tools().names().collect::<Vec<_>>()
        );

        Ok(Session {
            agent,
            system_prompt: self.system_prompt,
        })
    }
}

/// A research session.
///
/// The session holds a fully configured agent, and answers each query in a
/// fresh conversation. Queries don't share any state, so they can run
/// concurrently.
pub struct Session {
    agent: Agent,
    system_prompt: String,
}

impl Session {
    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Researches a query until the model gives an answer, or the run is
    /// stopped by `cancel` or the iteration limit.
    pub async fn research(
        &self,
        query: &str,
        cancel: &CancelSignal,
    ) -> Result<RunOutcome, RunError> {
        info!("researching: {query}");
        let history = History::with_prompt(&self.system_prompt, query.trim());
        self.agent.run(history, cancel).await
    }
}
