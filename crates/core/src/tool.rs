//! Tool call supports.

mod arguments;
mod broker;
mod error;
mod executor;
mod local;

pub use arguments::{RAW_ARGUMENTS_KEY, ToolArguments};
pub use broker::{ToolBroker, ToolOutput, ToolRequest};
pub use error::{Error, ErrorKind};
pub use executor::{
    Executor, ProgressStyle, ToolExecutionResult, ToolOutcome,
};
pub use local::LocalBroker;

/// The result of a tool call.
pub type ToolResult = Result<ToolOutput, Error>;
