//! The wire protocol of the chat stream.
//!
//! A chat response is a single `text/plain` byte stream that interleaves
//! model text with progress markers and, optionally, newline-terminated
//! JSON tool events. This crate defines both ends of it: the markers and
//! event lines the server writes, and the demultiplexer and aggregator
//! the client uses to turn the stream back into displayable blocks.

#![deny(missing_docs)]

pub mod aggregate;
pub mod chat;
pub mod demux;
pub mod event;
pub mod marker;

pub use aggregate::{
    ContentBlock, ToolAggregateBlock, split_content, split_content_aggregated,
};
pub use chat::{ChatMessage, ChatRequest, Role, normalize_toolkits};
pub use demux::{LineDemux, StreamItem};
pub use event::{ToolEvent, ToolEventData, ToolEventKind, parse_tool_event_line};
