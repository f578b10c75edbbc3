use odata_core::upstream::UpstreamSource;
use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    tool,
    tool_router,
};

use crate::ODataMcp;

#[tool_router(router = tool_router_metadata, vis = "pub")]
impl<S: UpstreamSource> ODataMcp<S> {
    #[tool(
        name = "GetODataMetadata",
        description = "Retrieves the OData API schema and available entity sets with their properties. Use this to discover what data is available before querying."
    )]
    async fn get_odata_metadata(&self) -> Result<CallToolResult, ErrorData> {
        let description = self.control().metadata_description().await;
        Ok(CallToolResult::success(vec![Content::text(description)]))
    }
}
