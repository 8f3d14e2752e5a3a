use research_agent_model::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
    /// If set, the stream ends without a completion event.
    #[serde(default)]
    pub unterminated: bool,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
            unterminated: false,
        }
    }

    /// Creates a `PresetResponse` with a single text delta.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Makes the stream stop after the events, as if the connection
    /// dropped before the model finished.
    #[inline]
    pub fn unterminated(mut self) -> Self {
        self.unterminated = true;
        self
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_load_from_json() {
        let script = json!({
            "events": [
                { "type": "message_delta", "data": "Saving your notes." },
                {
                    "type": "tool_call",
                    "data": {
                        "id": "call:7",
                        "name": "save_tool",
                        "arguments": { "content": "notes" }
                    }
                }
            ],
            "failures": 1
        });
        let response: PresetResponse = serde_json::from_value(script).unwrap();

        let expected = PresetResponse::with_events([
            PresetEvent::MessageDelta("Saving your notes.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call:7".to_owned(),
                name: "save_tool".to_owned(),
                arguments: json!({ "content": "notes" }),
            }),
        ])
        .with_failures(1);
        assert_eq!(response, expected);
    }
}
