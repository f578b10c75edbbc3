//! Control plane combining the query relay, the metadata service and the
//! tool registry behind one cloneable handle.

use std::{error::Error, fmt, sync::Arc, time::Duration};

use odata_model::schema::{TOOL_GET_DATA, TOOL_GET_ODATA_METADATA, TOOL_QUERY_PARAM};
use odata_model::{ToolExecutionRequest, ToolExecutionResponse, ToolsResponse};
use serde_json::Value;
use tracing::info;

use crate::relay::{QueryOutcome, QueryRelay};
use crate::services::{DEFAULT_CACHE_EXPIRATION, MetadataService};
use crate::tools::ToolRegistry;
use crate::upstream::UpstreamSource;

#[derive(Debug)]
pub enum ControlError {
    UnknownTool(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool(name) => write!(f, "unknown tool: {name}"),
        }
    }
}

impl Error for ControlError {}

pub struct ReportingControlPlane<S: UpstreamSource> {
    relay: QueryRelay<S>,
    metadata: MetadataService<S>,
    registry: Arc<ToolRegistry>,
}

impl<S: UpstreamSource> Clone for ReportingControlPlane<S> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
            metadata: self.metadata.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<S: UpstreamSource> ReportingControlPlane<S> {
    pub fn new(source: S) -> Self {
        Self::with_cache_expiration(source, DEFAULT_CACHE_EXPIRATION)
    }

    pub fn with_cache_expiration(source: S, expiration: Duration) -> Self {
        let source = Arc::new(source);
        Self {
            relay: QueryRelay::new(source.clone()),
            metadata: MetadataService::with_expiration(source, expiration),
            registry: Arc::new(ToolRegistry::with_reporting_tools()),
        }
    }

    pub const fn relay(&self) -> &QueryRelay<S> {
        &self.relay
    }

    pub const fn metadata(&self) -> &MetadataService<S> {
        &self.metadata
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Relays a raw OData query (`GetData`).
    pub async fn get_data(&self, query: Option<&str>) -> QueryOutcome {
        self.relay.execute(query).await
    }

    /// Current schema description (`GetODataMetadata`).
    pub async fn metadata_description(&self) -> String {
        self.metadata.get_tool_description().await
    }

    /// Registered tools, with the live schema description on `GetData`.
    pub async fn list_tools(&self) -> ToolsResponse {
        let mut tools = self.registry.all().to_vec();
        if let Some(get_data) = tools.iter_mut().find(|tool| tool.name == TOOL_GET_DATA) {
            get_data.description = self.metadata_description().await;
        }
        ToolsResponse { tools }
    }

    /// Executes a registered tool by name.
    ///
    /// # Errors
    /// Returns `ControlError::UnknownTool` if no tool has that name.
    pub async fn execute_tool(
        &self,
        request: ToolExecutionRequest,
    ) -> Result<ToolExecutionResponse, ControlError> {
        info!("executing tool {}", request.tool_name);
        match request.tool_name.as_str() {
            TOOL_GET_DATA => {
                let query = extract_query(&request.input);
                let outcome = self.get_data(query.as_deref()).await;
                Ok(if outcome.is_success() {
                    ToolExecutionResponse::ok(outcome.into_text())
                } else {
                    ToolExecutionResponse::failed(outcome.into_text())
                })
            }
            TOOL_GET_ODATA_METADATA => {
                Ok(ToolExecutionResponse::ok(self.metadata_description().await))
            }
            other => Err(ControlError::UnknownTool(other.to_string())),
        }
    }
}

/// Reads the query from tool input: either a JSON object carrying `query`
/// (as emitted by model tool calls) or the raw query string itself.
fn extract_query(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{')
        && let Ok(Value::Object(arguments)) = serde_json::from_str::<Value>(trimmed)
    {
        return arguments
            .get(TOOL_QUERY_PARAM)
            .and_then(Value::as_str)
            .map(str::to_string);
    }
    Some(input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_read_from_json_arguments() {
        assert_eq!(
            extract_query(r#"{"query":"/Products?$top=10"}"#).as_deref(),
            Some("/Products?$top=10")
        );
        assert_eq!(extract_query(r#"{"other":"x"}"#), None);
    }

    #[test]
    fn raw_input_is_the_query() {
        assert_eq!(
            extract_query("/Customers?$filter=City eq 'Seattle'").as_deref(),
            Some("/Customers?$filter=City eq 'Seattle'")
        );
        assert_eq!(extract_query("   "), None);
    }

    #[test]
    fn broken_json_falls_back_to_raw_text() {
        assert_eq!(extract_query("{not json").as_deref(), Some("{not json"));
    }
}
