use agent_studio_model::ModelTool;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolList {
    #[serde(default)]
    pub items: Vec<ToolItem>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolItem {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_parameters: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub successful: Option<bool>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecuteRequest<'a> {
    pub user_id: &'a str,
    pub arguments: &'a Value,
}

// -----------
// Conversions
// -----------

/// Maps a broker tool to a function tool. The slug is the function name,
/// since it is what the execute endpoint expects back.
pub fn create_tool(item: ToolItem) -> ModelTool {
    let parameters = match item.input_parameters {
        Some(Value::Object(object)) if !object.is_empty() => Value::Object(object),
        _ => json!({ "type": "object", "properties": {} }),
    };
    let description = item
        .description
        .filter(|description| !description.is_empty())
        .or(item.name)
        .unwrap_or_default();
    ModelTool {
        name: item.slug,
        description,
        parameters,
    }
}

/// Returns the failure reason of an execution, if it failed.
pub fn execution_failure(resp: &ExecuteResponse) -> Option<String> {
    let reason = match &resp.error {
        None | Some(Value::Null) => None,
        Some(Value::String(message)) if message.is_empty() => None,
        Some(Value::String(message)) => Some(message.clone()),
        Some(other) => Some(other.to_string()),
    };
    match (resp.successful, reason) {
        (_, Some(reason)) => Some(reason),
        (Some(false), None) => Some("tool execution was not successful".to_owned()),
        _ => None,
    }
}

/// Extracts a readable message from an error body.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("error"))?;
    match message {
        Value::String(message) => Some(message.clone()),
        _ => None,
    }
}
