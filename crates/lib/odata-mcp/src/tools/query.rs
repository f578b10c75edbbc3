use odata_core::upstream::UpstreamSource;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::ODataMcp;
use crate::helpers;

/// Parameters for relaying an OData query.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetDataParams {
    /// OData path and query, e.g. `/Customers?$filter=City eq 'Seattle'&$select=FirstName,LastName&$top=10`.
    pub query: Option<String>,
}

#[tool_router(router = tool_router_query, vis = "pub")]
impl<S: UpstreamSource> ODataMcp<S> {
    #[tool(
        name = "GetData",
        description = "Execute an OData query against the reporting API and return the raw JSON response. Call GetODataMetadata first to see the available entity sets and their properties."
    )]
    async fn get_data(
        &self,
        Parameters(params): Parameters<GetDataParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self.control().get_data(params.query.as_deref()).await;
        Ok(helpers::query_result(outcome))
    }
}

#[cfg(test)]
mod tests {
    use odata_core::control::ReportingControlPlane;
    use odata_core::relay::MISSING_QUERY_MESSAGE;

    use super::*;
    use crate::testing::{FixedSource, is_error, text_of};

    fn server() -> ODataMcp<FixedSource> {
        ODataMcp::new(ReportingControlPlane::new(FixedSource))
    }

    async fn call(query: Option<&str>) -> CallToolResult {
        server()
            .get_data(Parameters(GetDataParams {
                query: query.map(str::to_string),
            }))
            .await
            .expect("GetData result")
    }

    #[tokio::test]
    async fn query_is_relayed_under_odata_prefix() {
        let result = call(Some("Products?$top=5")).await;
        assert!(!is_error(&result));
        assert_eq!(text_of(&result), "/odata/Products?$top=5");
    }

    #[tokio::test]
    async fn upstream_failure_is_a_tool_error() {
        let result = call(Some("/Products?$filter=bogus")).await;
        assert!(is_error(&result));
        assert_eq!(
            text_of(&result),
            "Error: Query failed with status 400 (Bad Request). Details: invalid $filter"
        );
    }

    #[tokio::test]
    async fn missing_query_is_a_tool_error() {
        let result = call(None).await;
        assert!(is_error(&result));
        assert_eq!(text_of(&result), MISSING_QUERY_MESSAGE);
    }
}
