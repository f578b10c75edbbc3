//! Chat relay for odata-mcp.
//!
//! Holds per-session conversations with a hosted OpenAI-compatible model,
//! discovers reporting tools from the tool relay and executes the tool calls
//! the model asks for.

pub mod endpoint;
pub mod model;
pub mod relay_client;
pub mod server;
pub mod service;
pub mod suggest;

#[cfg(test)]
mod testing;
