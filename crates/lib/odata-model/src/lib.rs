//! Wire models and shared constants for odata-mcp.
//!
//! This crate defines the data shared by the summarizer, the tool relay and
//! the chat front-end, plus the namespaces, tool names and routes they agree on.

pub mod models;
pub mod schema;

pub use models::*;
