//! Conversation history types.

use std::collections::HashSet;

use research_agent_model::{
    AssistantMessage, ModelMessage, OpaqueMessage, ToolCallRequest,
    ToolCallResult,
};

/// The author of a [`Turn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Instructions that steer the model.
    System,
    /// Input from the person using the agent.
    Human,
    /// A message generated by the model.
    Assistant,
    /// The answer of a tool to one tool call.
    ToolResult,
}

/// One message in the conversation history.
#[derive(Clone, Debug)]
pub struct Turn {
    pub(crate) msg: ModelMessage,
    content: String,
    tool_calls: Vec<ToolCallRequest>,
}

impl Turn {
    /// Creates a system turn.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        let content = content.into();
        Self {
            msg: ModelMessage::System(content.clone()),
            content,
            tool_calls: vec![],
        }
    }

    /// Creates a human turn.
    #[inline]
    pub fn human<S: Into<String>>(content: S) -> Self {
        let content = content.into();
        Self {
            msg: ModelMessage::User(content.clone()),
            content,
            tool_calls: vec![],
        }
    }

    /// Creates an assistant turn from a completed model response.
    ///
    /// The opaque message, if any, is what the provider gets back in later
    /// requests. Otherwise a provider-neutral message is rebuilt from the
    /// content and tool calls.
    pub(crate) fn assistant(
        content: String,
        tool_calls: Vec<ToolCallRequest>,
        opaque_msg: Option<OpaqueMessage>,
    ) -> Self {
        let msg = match opaque_msg {
            Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
            None => ModelMessage::Assistant(AssistantMessage {
                content: content.clone(),
                tool_calls: tool_calls.clone(),
            }),
        };
        Self {
            msg,
            content,
            tool_calls,
        }
    }

    pub(crate) fn tool_result(call_id: String, content: String) -> Self {
        Self {
            msg: ModelMessage::Tool(ToolCallResult {
                id: call_id,
                content: content.clone(),
            }),
            content,
            tool_calls: vec![],
        }
    }

    /// Returns the role of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        match &self.msg {
            ModelMessage::System(_) => Role::System,
            ModelMessage::User(_) => Role::Human,
            ModelMessage::Assistant(_) | ModelMessage::Opaque(_) => {
                Role::Assistant
            }
            ModelMessage::Tool(_) => Role::ToolResult,
        }
    }

    /// Returns the text content, which may be empty for an assistant turn
    /// that only calls tools.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the tool calls requested in this turn, in request order.
    ///
    /// Only assistant turns may have tool calls.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.tool_calls
    }

    /// Returns the id of the tool call this turn answers, if it's a tool
    /// result.
    #[inline]
    pub fn call_id(&self) -> Option<&str> {
        match &self.msg {
            ModelMessage::Tool(result) => Some(&result.id),
            _ => None,
        }
    }
}

/// Errors for appending a turn that would break the history invariants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// A tool result doesn't answer an unanswered call of the latest
    /// assistant turn.
    #[error("tool result `{0}` does not answer any pending tool call")]
    UnexpectedToolResult(String),
    /// A new non-tool turn was added while tool calls are unanswered.
    #[error("{0} tool call(s) are still unanswered")]
    UnansweredToolCalls(usize),
    /// An assistant turn contains a tool call without an id.
    #[error("tool call `{0}` has an empty id")]
    EmptyCallId(String),
    /// An assistant turn contains the same call id more than once.
    #[error("tool call id `{0}` is used more than once")]
    DuplicateCallId(String),
    /// The history lacks the system or the human turn needed to start.
    #[error("history needs at least one system turn and one human turn")]
    MissingPrompt,
}

/// An append-only conversation history.
///
/// Appending checks the tool call invariants: each tool result answers
/// exactly one unanswered call of the latest assistant turn, and no other
/// turn may be appended before all of those calls are answered.
#[derive(Clone, Debug, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Creates an empty history.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history holding a system prompt and the human query.
    pub fn with_prompt<S1, S2>(system: S1, query: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            turns: vec![Turn::system(system), Turn::human(query)],
        }
    }

    /// Appends a turn.
    ///
    /// On error, the history is left untouched.
    pub fn push(&mut self, turn: Turn) -> Result<(), HistoryError> {
        if let Some(call_id) = turn.call_id() {
            let pending = self.pending_tool_calls();
            if !pending.iter().any(|call| call.id == call_id) {
                return Err(HistoryError::UnexpectedToolResult(
                    call_id.to_owned(),
                ));
            }
        } else {
            let pending = self.pending_tool_calls().len();
            if pending > 0 {
                return Err(HistoryError::UnansweredToolCalls(pending));
            }
            check_call_ids(&turn.tool_calls)?;
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Returns all turns in order.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if there are no turns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the latest turn.
    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the tool calls of the latest assistant turn that have not
    /// been answered yet, in request order.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCallRequest> {
        let Some(assistant_idx) = self
            .turns
            .iter()
            .rposition(|turn| turn.role() == Role::Assistant)
        else {
            return vec![];
        };
        let answered: HashSet<&str> = self.turns[assistant_idx + 1..]
            .iter()
            .filter_map(Turn::call_id)
            .collect();
        self.turns[assistant_idx]
            .tool_calls
            .iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }

    /// Checks that the history can start an agent run.
    pub fn check_prompt(&self) -> Result<(), HistoryError> {
        let has_role =
            |role| self.turns.iter().any(|turn| turn.role() == role);
        if !has_role(Role::System) || !has_role(Role::Human) {
            return Err(HistoryError::MissingPrompt);
        }
        let pending = self.pending_tool_calls().len();
        if pending > 0 {
            return Err(HistoryError::UnansweredToolCalls(pending));
        }
        Ok(())
    }

    pub(crate) fn to_messages(&self) -> Vec<ModelMessage> {
        self.turns.iter().map(|turn| turn.msg.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

fn check_call_ids(tool_calls: &[ToolCallRequest]) -> Result<(), HistoryError> {
    let mut seen = HashSet::with_capacity(tool_calls.len());
    for call in tool_calls {
        if call.id.is_empty() {
            return Err(HistoryError::EmptyCallId(call.name.clone()));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(HistoryError::DuplicateCallId(call.id.clone()));
        }
    }
    Ok(())
}
