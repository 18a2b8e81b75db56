//! Core logic of a chat turn: streaming completions, accumulating tool
//! calls, running tools through a broker and multiplexing everything
//! into one output stream.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod accumulator;
pub mod conversation;
mod model_client;
mod orchestrator;
pub mod sink;
pub mod tool;

pub use model_client::{ModelClient, ModelStream};
pub use orchestrator::{
    ChatTurn, Orchestrator, OrchestratorError, OrchestratorOptions,
    TurnOutcome, TurnStage,
};
