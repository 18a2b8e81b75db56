use serde::{Deserialize, Serialize};

/// A piece of a tool call, as streamed by the model.
///
/// Fragments are keyed by `index`, which is the position of the call in
/// the model's tool call list for the current completion. It is not
/// unique across completions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Position of the tool call within the completion.
    pub index: u32,
    /// Provider-assigned identifier, usually only in the first fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Call type, usually only in the first fragment.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The function part of the fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionFragment>,
}

/// The function part of a [`ToolCallFragment`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionFragment {
    /// The function name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A slice of the argument JSON text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallFragment {
    /// Creates a fragment that opens a tool call.
    #[inline]
    pub fn start<I, N>(index: u32, id: I, name: N) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Self {
            index,
            id: Some(id.into()),
            kind: Some("function".to_owned()),
            function: Some(FunctionFragment {
                name: Some(name.into()),
                arguments: None,
            }),
        }
    }

    /// Creates a fragment that only carries a slice of arguments.
    #[inline]
    pub fn arguments<S: Into<String>>(index: u32, arguments: S) -> Self {
        Self {
            index,
            id: None,
            kind: None,
            function: Some(FunctionFragment {
                name: None,
                arguments: Some(arguments.into()),
            }),
        }
    }
}

/// A complete tool call, ready to be executed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallInvocation {
    /// The unique identifier for the tool call.
    pub id: String,
    /// Call type, always `function` for now.
    #[serde(rename = "type")]
    pub kind: String,
    /// The function to call.
    pub function: FunctionCall,
}

/// The function part of a [`ToolCallInvocation`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function.
    pub name: String,
    /// The raw argument text. It is usually JSON, but is not guaranteed
    /// to be.
    pub arguments: String,
}

impl ToolCallInvocation {
    /// Creates a function invocation.
    #[inline]
    pub fn function<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            kind: "function".to_owned(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Replaces the call type.
    #[inline]
    pub fn with_kind<S: Into<String>>(self, kind: S) -> Self {
        Self {
            kind: kind.into(),
            ..self
        }
    }

    /// Returns the name of the function to call.
    #[inline]
    pub fn name(&self) -> &str {
        &self.function.name
    }
}
