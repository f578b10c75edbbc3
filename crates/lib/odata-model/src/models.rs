use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Summary of one entity set as advertised by the `$metadata` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySetSummary {
    pub name: String,
    /// Key property names in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Non-key property names in document order, capped by the summarizer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub navigation: Vec<String>,
    /// False when the referenced entity type has no definition in the document.
    pub type_resolved: bool,
}

impl EntitySetSummary {
    /// Entity sets whose name starts with `V` are reported as views.
    #[must_use]
    pub fn is_view(&self) -> bool {
        self.name.starts_with('V')
    }
}

/// Last computed metadata description and when it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedDescription {
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Tool metadata served by the discovery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Envelope returned by `GET /api/mcp/tools`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolsResponse {
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

/// Request body for executing a tool by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionRequest {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub input: String,
}

/// Result of executing a tool by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolExecutionResponse {
    pub success: bool,
    #[serde(default)]
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolExecutionResponse {
    #[must_use]
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Chat request posted by the front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Chat reply returned to the front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageResponse {
    pub response: String,
    #[serde(default)]
    pub suggested_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Request body for clearing a chat session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClearSessionRequest {
    pub session_id: Uuid,
}
