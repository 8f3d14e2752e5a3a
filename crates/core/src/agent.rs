mod builder;
mod outcome;
mod state;

use std::sync::Arc;

use crate::cancel::CancelSignal;
use crate::history::{History, Turn};
use crate::model_client::{ModelClient, TranscriptFn};
use crate::tool::ToolRegistry;
pub use builder::AgentBuilder;
pub use outcome::{RunError, RunErrorKind, RunOutcome, RunStatus};
use state::RunState;

/// The default bound of model calls in one run.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// The stage of an agent run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Waiting for the model to produce the next assistant turn.
    Generating,
    /// Running the tools requested by the latest assistant turn.
    Acting,
    /// The latest assistant turn requested no tools, the run is complete.
    Done,
}

type StageFn = Arc<dyn Fn(Stage) + Send + Sync>;
type TurnFn = Arc<dyn Fn(&Turn) + Send + Sync>;

#[derive(Clone, Default)]
struct Observers {
    on_stage: Option<StageFn>,
    on_turn: Option<TurnFn>,
    on_transcript: Option<TranscriptFn>,
}

/// A reason-then-act agent.
///
/// The agent alternates between asking the model for the next turn and
/// running the tools that turn requests, until the model answers without
/// calling any tool. An agent holds no per-query state, so one instance
/// can serve many queries, even concurrently.
#[derive(Clone)]
pub struct Agent {
    model_client: ModelClient,
    tools: Arc<ToolRegistry>,
    max_iterations: Option<usize>,
    observers: Observers,
}

impl Agent {
    /// Returns a builder with the specified model provider.
    #[inline]
    pub fn builder<P>(provider: P) -> AgentBuilder
    where
        P: research_agent_model::ModelProvider + 'static,
    {
        AgentBuilder::with_model_provider(provider)
    }

    /// Returns the tools available to the model.
    #[inline]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Returns the name of the model driving this agent.
    #[inline]
    pub fn model_name(&self) -> &str {
        self.model_client.model_name()
    }

    /// Returns the maximum number of model calls in one run, `None` if
    /// unbounded.
    #[inline]
    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    /// Runs the agent until the model gives an answer.
    ///
    /// The history must hold at least a system turn and a human turn. The
    /// run also stops early when `cancel` is raised or the iteration limit
    /// is reached, in which case the returned outcome is marked incomplete.
    ///
    /// On error, the history accumulated so far is kept in the returned
    /// [`RunError`].
    pub async fn run(
        &self,
        history: History,
        cancel: &CancelSignal,
    ) -> Result<RunOutcome, RunError> {
        RunState::new(self, history).run(cancel).await
    }
}
