//! An abstraction layer for streaming chat-completion models.
//!
//! This crate establishes the protocol between the chat orchestrator
//! and the model providers it drives: requests carry the conversation
//! and the tool definitions, and responses are streams of events that
//! deliver text deltas, raw tool-call fragments and a finish reason.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. In particular,
//! providers must forward tool-call fragments as they arrive instead of
//! assembling them, so the orchestrator stays in charge of ordering.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;
mod tool_call;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
pub use tool_call::*;
