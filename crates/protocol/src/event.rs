//! Tool events, one JSON object per line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every tool event name starts with this prefix.
pub const TOOL_EVENT_PREFIX: &str = "on_tool_";

/// A tool event as it appears on the wire.
///
/// Unknown fields are kept in `extra` so a line re-serializes to the
/// same object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    /// The event name, e.g. `on_tool_start`.
    pub event: String,
    /// The tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Identifies one tool execution across its events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// The event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ToolEventData>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The payload of a [`ToolEvent`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolEventData {
    /// The tool input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// The tool output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// The failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// The known tool event names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolEventKind {
    /// `on_tool_start`
    Start,
    /// `on_tool_end`
    End,
    /// `on_tool_error`
    Error,
    /// Any other `on_tool_*` event.
    Other,
}

impl ToolEventKind {
    /// Returns the wire name of the event, `None` for [`ToolEventKind::Other`].
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            ToolEventKind::Start => Some("on_tool_start"),
            ToolEventKind::End => Some("on_tool_end"),
            ToolEventKind::Error => Some("on_tool_error"),
            ToolEventKind::Other => None,
        }
    }
}

impl ToolEvent {
    fn new(
        kind: ToolEventKind,
        name: &str,
        run_id: &str,
        data: ToolEventData,
    ) -> Self {
        Self {
            event: kind.as_str().unwrap_or(TOOL_EVENT_PREFIX).to_owned(),
            name: Some(name.to_owned()),
            run_id: Some(run_id.to_owned()),
            data: Some(data),
            extra: Map::new(),
        }
    }

    /// Creates an `on_tool_start` event.
    pub fn start(name: &str, run_id: &str, input: Value) -> Self {
        let data = ToolEventData {
            input: Some(input),
            ..Default::default()
        };
        Self::new(ToolEventKind::Start, name, run_id, data)
    }

    /// Creates an `on_tool_end` event.
    pub fn end(name: &str, run_id: &str, output: Value) -> Self {
        let data = ToolEventData {
            output: Some(output),
            ..Default::default()
        };
        Self::new(ToolEventKind::End, name, run_id, data)
    }

    /// Creates an `on_tool_error` event.
    pub fn error(name: &str, run_id: &str, reason: &str) -> Self {
        let data = ToolEventData {
            error: Some(Value::String(reason.to_owned())),
            ..Default::default()
        };
        Self::new(ToolEventKind::Error, name, run_id, data)
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> ToolEventKind {
        match self.event.as_str() {
            "on_tool_start" => ToolEventKind::Start,
            "on_tool_end" => ToolEventKind::End,
            "on_tool_error" => ToolEventKind::Error,
            _ => ToolEventKind::Other,
        }
    }

    /// Returns the run id if it is present and not empty.
    #[inline]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Serializes the event as a newline-terminated line.
    pub fn to_line(&self) -> String {
        // Serializing maps with string keys cannot fail.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// Parses a single line as a tool event.
///
/// The line is trimmed first. Only a JSON object whose `event` is a
/// string starting with `on_tool_` is an event; anything else, including
/// malformed JSON, yields `None`.
///
/// The other fields are read leniently. A `name` that is not a string and
/// a `data` that is not an object are kept in `extra`. A `run_id` that is
/// not a string becomes its JSON text unless it is `null`, `false` or `0`.
pub fn parse_tool_event_line(line: &str) -> Option<ToolEvent> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(line) else {
        return None;
    };
    let event = match object.remove("event") {
        Some(Value::String(event)) if event.starts_with(TOOL_EVENT_PREFIX) => event,
        _ => return None,
    };
    let name = match object.remove("name") {
        Some(Value::String(name)) => Some(name),
        Some(Value::Null) | None => None,
        Some(other) => {
            object.insert("name".to_owned(), other);
            None
        }
    };
    let run_id = object.remove("run_id").and_then(run_id_key);
    let data = match object.remove("data") {
        Some(Value::Object(data)) => Some(ToolEventData::from_object(data)),
        Some(Value::Null) | None => None,
        Some(other) => {
            object.insert("data".to_owned(), other);
            None
        }
    };
    Some(ToolEvent {
        event,
        name,
        run_id,
        data,
        extra: object,
    })
}

fn run_id_key(value: Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id),
        Value::Bool(true) => Some("true".to_owned()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        value @ (Value::Array(_) | Value::Object(_)) => Some(value.to_string()),
        _ => None,
    }
}

impl ToolEventData {
    fn from_object(mut data: Map<String, Value>) -> Self {
        let mut take = |key: &str| data.remove(key).filter(|value| !value.is_null());
        Self {
            input: take("input"),
            output: take("output"),
            error: take("error"),
        }
    }
}
