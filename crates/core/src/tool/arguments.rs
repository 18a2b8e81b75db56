use serde_json::{Map, Value};

/// The key under which unparsable arguments are passed to a tool.
pub const RAW_ARGUMENTS_KEY: &str = "$raw";

/// The arguments of a tool call, as decoded from the model output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolArguments {
    /// The argument text was valid JSON.
    Parsed(Value),
    /// The argument text could not be parsed and is kept verbatim.
    Raw(String),
}

impl ToolArguments {
    /// Decodes the argument text of a tool call. An empty text means no
    /// arguments and decodes to an empty object.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return ToolArguments::Parsed(Value::Object(Map::new()));
        }
        match serde_json::from_str(text) {
            Ok(value) => ToolArguments::Parsed(value),
            Err(err) => {
                debug!("tool arguments are not valid JSON: {err}");
                ToolArguments::Raw(text.to_owned())
            }
        }
    }

    /// Returns `true` if the arguments could not be parsed.
    #[inline]
    pub fn is_raw(&self) -> bool {
        matches!(self, ToolArguments::Raw(_))
    }

    /// Converts the arguments into the value passed to the tool. Raw
    /// text is wrapped as `{"$raw": text}`.
    pub fn into_value(self) -> Value {
        match self {
            ToolArguments::Parsed(value) => value,
            ToolArguments::Raw(text) => {
                let mut object = Map::new();
                object.insert(RAW_ARGUMENTS_KEY.to_owned(), Value::String(text));
                Value::Object(object)
            }
        }
    }
}
