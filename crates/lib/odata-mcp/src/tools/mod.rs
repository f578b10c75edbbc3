//! MCP tool modules.
//!
//! `query` relays raw OData queries, `metadata` describes what can be queried.

pub mod metadata;
pub mod query;
