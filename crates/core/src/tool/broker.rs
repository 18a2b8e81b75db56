use agent_studio_model::ModelTool;
use async_trait::async_trait;
use serde_json::Value;

use crate::tool::{Error, ToolResult};

/// A request to execute a tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolRequest {
    /// The broker user the tool acts for.
    pub user_id: String,
    /// The decoded arguments.
    pub arguments: Value,
}

/// The successful result of a tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutput {
    /// A plain string result, passed to the model verbatim.
    Text(String),
    /// A structured result, passed to the model as JSON text.
    Json(Value),
}

impl ToolOutput {
    /// Returns the result as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutput::Text(text) => Value::String(text.clone()),
            ToolOutput::Json(value) => value.clone(),
        }
    }

    /// Converts the result into the content of a `tool` message.
    pub fn into_content(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::Json(value) => value.to_string(),
        }
    }
}

/// A service that provides tools and executes them on behalf of a user.
///
/// Implementations own all knowledge about the tools: the orchestrator
/// only forwards the definitions to the model and the calls back to the
/// broker.
#[async_trait]
pub trait ToolBroker: Send + Sync {
    /// Lists the tools of the given toolkits that are available to the
    /// user.
    async fn list_tools(
        &self,
        user_id: &str,
        toolkits: &[String],
    ) -> Result<Vec<ModelTool>, Error>;

    /// Executes a tool by name.
    async fn execute(&self, name: &str, request: ToolRequest) -> ToolResult;
}
