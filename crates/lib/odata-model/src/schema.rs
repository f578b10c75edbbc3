pub const EDM_NAMESPACE: &str = "http://docs.oasis-open.org/odata/ns/edm";

pub const TOOL_GET_DATA: &str = "GetData";
pub const TOOL_GET_ODATA_METADATA: &str = "GetODataMetadata";
pub const TOOL_QUERY_PARAM: &str = "query";

pub const ODATA_PREFIX: &str = "/odata";
pub const ODATA_METADATA_PATH: &str = "/odata/$metadata";

pub const ROUTE_HEALTH: &str = "/health";
pub const ROUTE_TOOLS: &str = "/api/mcp/tools";
pub const ROUTE_EXECUTE_TOOL: &str = "/api/chat/execute-tool";

pub const GET_DATA_QUERY_DESCRIPTION: &str =
    "OData query string to execute against the reporting data source. Format: /EntitySetName?$queryOptions";
pub const GET_ODATA_METADATA_DESCRIPTION: &str = "Retrieves the OData API schema and available entity sets with their properties. Use this to discover what data is available before querying.";

/// Joins the `/odata` prefix with a normalized path and query.
#[must_use]
pub fn odata_path(path_and_query: &str) -> String {
    format!("{ODATA_PREFIX}{path_and_query}")
}
