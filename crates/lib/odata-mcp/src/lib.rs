//! MCP server implementation for odata-mcp.
//!
//! This crate wires the reporting control plane into rmcp tool handlers and
//! exposes `GetData` and `GetODataMetadata` to MCP clients.

mod helpers;
mod tools;
pub mod server;

#[cfg(test)]
mod testing;

pub use tools::query::GetDataParams;

use odata_core::control::ReportingControlPlane;
use odata_core::upstream::UpstreamSource;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

const SERVER_INSTRUCTIONS: &str = r"odata-mcp gives read-only access to an OData reporting API.

Workflow:
1. Call `GetODataMetadata` to learn the entity sets, their keys, properties and navigation properties.
   Entity sets starting with `V` are database views; the rest are core tables.
2. Call `GetData` with a `query` made of an entity set path plus OData options, for example
   `/Customers?$filter=City eq 'Seattle'&$select=FirstName,LastName&$orderby=LastName&$top=10`.
   The leading `/` is optional. The query is forwarded unchanged and the JSON response is returned as-is.

Notes:
- Supported options: `$filter`, `$select`, `$orderby`, `$top`, `$skip`, `$expand`, `$count`, `$apply`.
- Failed queries come back as tool errors of the form `Error: Query failed with status ... Details: ...`.
- `health` returns `ok`.";

/// MCP server wrapper around the reporting control plane.
pub struct ODataMcp<S: UpstreamSource> {
    tool_router: ToolRouter<Self>,
    control: ReportingControlPlane<S>,
}

impl<S: UpstreamSource> Clone for ODataMcp<S> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            control: self.control.clone(),
        }
    }
}

impl<S: UpstreamSource> ODataMcp<S> {
    /// Creates a new server over a control plane handle.
    #[must_use]
    pub fn new(control: ReportingControlPlane<S>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_query()
            + Self::tool_router_metadata();
        Self {
            tool_router,
            control,
        }
    }

    pub(crate) const fn control(&self) -> &ReportingControlPlane<S> {
        &self.control
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<S: UpstreamSource> ODataMcp<S> {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl<S: UpstreamSource> ServerHandler for ODataMcp<S> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
