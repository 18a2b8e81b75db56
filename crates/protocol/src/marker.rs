//! Plain-text progress markers written between model text.
//!
//! Markers are part of the visible body: clients that don't understand
//! them still render a readable transcript.

/// Written once, after the first completion, when tools are about to run.
pub const RUNNING_TOOLS: &str = "\n[running tools...]\n";

/// Written once, after all tools ran, before the follow-up completion.
pub const GENERATING_RESPONSE: &str = "[generating response...]\n\n";

/// Written before a tool is executed.
#[inline]
pub fn tool_started(name: &str) -> String {
    format!("> {name}...\n")
}

/// Written after a tool returned successfully.
#[inline]
pub fn tool_done(name: &str) -> String {
    format!("✔ {name} done\n")
}

/// Written after a tool failed.
#[inline]
pub fn tool_failed(reason: &str) -> String {
    format!("✖ tool failed: {reason}\n")
}

/// Written as the last thing in the stream when the turn failed.
#[inline]
pub fn error(message: &str) -> String {
    format!("\n[error] {message}\n")
}

/// The content of the `tool` message injected for a failed tool.
#[inline]
pub fn tool_failure_content(reason: &str) -> String {
    format!("Tool execution failed: {reason}")
}
