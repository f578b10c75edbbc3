//! Core services for odata-mcp.
//!
//! This crate owns the `$metadata` summarizer and its cache, the relay that
//! forwards raw OData queries to the reporting API, and the tool registry
//! exposed by the MCP and discovery servers.

pub mod control;
pub mod metadata;
pub mod relay;
pub mod services;
pub mod tools;
pub mod upstream;
