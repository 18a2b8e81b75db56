//! The agent studio chat server: configuration, the `/api/chat` HTTP
//! endpoint and a client for it.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod client;
pub mod config;
pub mod error;
pub mod server;

pub use client::{ChatClient, ChatStream, ClientError};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use server::{AppState, router};
