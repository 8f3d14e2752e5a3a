use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpaqueMessage;
use crate::provider::ModelProviderError;

/// A streamed answer to one [`ModelRequest`](crate::ModelRequest).
///
/// A response yields text deltas and tool call requests in the order the
/// model produced them, and ends with exactly one
/// [`ModelResponseEvent::Completed`].
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next event.
    ///
    /// Returns `Poll::Ready(Ok(None))` once the response is exhausted, and
    /// keeps returning it if polled again. An `Err` ends the response.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;

    /// Makes an [`OpaqueMessage`] that stands for the assistant turn in
    /// this response, so the provider can replay it verbatim next time.
    ///
    /// Only meaningful after all events have been drained. Calling it
    /// twice must yield the same message.
    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        None
    }
}

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The turn asks for one or more tools to be called.
    ToolCalls,
    /// The turn is a final answer.
    Stop,
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The correlation id, echoed back with the result.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool, expected to be a JSON object.
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Creates a tool call request.
    #[inline]
    pub fn new<I, N>(id: I, name: N, arguments: Value) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// An event of a model response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The response has been completed.
    Completed(ModelFinishReason),
    /// A piece of the assistant's text.
    MessageDelta(String),
    /// A complete tool call request.
    ToolCall(ToolCallRequest),
}
