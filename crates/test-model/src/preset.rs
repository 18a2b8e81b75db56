use agent_studio_model::{ModelFinishReason, ToolCallFragment};
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta(Vec<ToolCallFragment>),
    /// The stream breaks with an error carrying this message.
    #[serde(rename = "failure")]
    Failure(String),
}

/// The preset response for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// The finish reason delivered after all events. `None` means the
    /// stream ends without one.
    pub finish_reason: Option<ModelFinishReason>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events. The finish
    /// reason is `ToolCalls` if any tool call delta is present, and `Stop`
    /// otherwise.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        let events = events.into();
        let has_tool_call = events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCallDelta(_)));
        Self {
            events,
            finish_reason: Some(if has_tool_call {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            }),
        }
    }

    /// Creates a text-only response streamed in the given slices.
    #[inline]
    pub fn with_text<I, S>(slices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let events: Vec<_> = slices
            .into_iter()
            .map(|slice| PresetEvent::MessageDelta(slice.into()))
            .collect();
        Self::with_events(events)
    }

    /// Overrides the finish reason.
    #[inline]
    pub fn with_finish_reason(
        mut self,
        finish_reason: Option<ModelFinishReason>,
    ) -> Self {
        self.finish_reason = finish_reason;
        self
    }
}
