use research_agent_model::ModelProviderError;

use crate::history::{History, HistoryError, Role};
use crate::tool::RegistryError;

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// The model answered without calling any tool.
    Completed,
    /// The run was cancelled before the model answered.
    Cancelled,
    /// The run stopped after reaching the iteration limit.
    IterationLimitReached,
}

/// The result of a run that didn't fail.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// The full history, including the initial turns.
    pub history: History,
    /// How the run ended.
    pub status: RunStatus,
    /// Number of times the agent ran tools.
    pub acting_phases: usize,
}

impl RunOutcome {
    /// Returns `true` if the model gave an answer.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Returns the answer of the model, or `None` if the run is incomplete.
    pub fn final_answer(&self) -> Option<&str> {
        if !self.is_completed() {
            return None;
        }
        self.history
            .last()
            .filter(|turn| turn.role() == Role::Assistant)
            .map(|turn| turn.content())
    }
}

/// What made a run fail.
#[derive(Debug, thiserror::Error)]
pub enum RunErrorKind {
    /// The history can't start a run.
    #[error("invalid history: {0}")]
    InvalidHistory(HistoryError),
    /// The model request failed, after retries if any.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),
    /// The model responded with tool calls that can't be answered.
    #[error("malformed model response: {0}")]
    MalformedResponse(HistoryError),
    /// The model called a tool with arguments outside of its schema.
    #[error("malformed model response: {0}")]
    InvalidArguments(RegistryError),
}

/// The error of a failed run.
///
/// The history accumulated before the failure is kept, the turn that
/// caused it is not appended.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct RunError {
    kind: RunErrorKind,
    history: History,
}

impl RunError {
    #[inline]
    pub(crate) fn new(kind: RunErrorKind, history: History) -> Self {
        Self { kind, history }
    }

    /// Returns what made the run fail.
    #[inline]
    pub fn kind(&self) -> &RunErrorKind {
        &self.kind
    }

    /// Returns the history accumulated before the failure.
    #[inline]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Consumes the error and returns the history.
    #[inline]
    pub fn into_history(self) -> History {
        self.history
    }
}
