//! MCP bridge for OpenAI-compatible chat-completion endpoints.
//!
//! Exposes a single `chat_completion` tool over JSON-RPC 2.0 HTTP. A tool
//! call becomes one upstream chat-completion request; streamed upstream
//! deltas are re-emitted as MCP `notifications/progress` events followed by
//! one final tool result.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod protocol;
pub mod reassembler;
pub mod server;
pub mod upstream;

pub mod schema;
