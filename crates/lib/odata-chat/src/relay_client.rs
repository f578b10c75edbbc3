//! HTTP client for the tool relay's discovery API.

use std::{error::Error, fmt, time::Duration};

use futures::future::BoxFuture;
use odata_model::schema::{ROUTE_EXECUTE_TOOL, ROUTE_TOOLS};
use odata_model::{ToolExecutionRequest, ToolExecutionResponse, ToolsResponse};
use reqwest::{Client, Response};
use tracing::{error, info};

use crate::endpoint::normalize_base_url;

pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub enum RelayError {
    InvalidBaseUrl(String),
    Status { status: u16, body: String },
    Transport(reqwest::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid tool relay url: {value}"),
            Self::Status { status, body } => {
                write!(f, "tool relay returned status {status}: {body}")
            }
            Self::Transport(err) => write!(f, "tool relay request failed: {err}"),
        }
    }
}

impl Error for RelayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

/// Seam between chat sessions and the tool relay.
pub trait ToolRelay: Send + Sync + 'static {
    fn list_tools(&self) -> BoxFuture<'_, Result<ToolsResponse, RelayError>>;

    fn execute_tool(
        &self,
        request: ToolExecutionRequest,
    ) -> BoxFuture<'_, Result<ToolExecutionResponse, RelayError>>;
}

/// `reqwest`-backed client for `GET /api/mcp/tools` and
/// `POST /api/chat/execute-tool`.
#[derive(Debug, Clone)]
pub struct ToolRelayClient {
    client: Client,
    base_url: String,
}

impl ToolRelayClient {
    /// Builds a client for the relay at `base_url`.
    ///
    /// # Errors
    /// Returns `RelayError::InvalidBaseUrl` for anything but an http(s) URL, or
    /// `RelayError::Transport` if the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let base_url = normalize_base_url(base_url)
            .ok_or_else(|| RelayError::InvalidBaseUrl(base_url.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ToolRelay for ToolRelayClient {
    fn list_tools(&self) -> BoxFuture<'_, Result<ToolsResponse, RelayError>> {
        Box::pin(async move {
            info!("fetching available tools from {}", self.base_url);
            let response = self
                .client
                .get(format!("{}{ROUTE_TOOLS}", self.base_url))
                .send()
                .await?;
            let response = ensure_success(response).await?;
            Ok(response.json().await?)
        })
    }

    fn execute_tool(
        &self,
        request: ToolExecutionRequest,
    ) -> BoxFuture<'_, Result<ToolExecutionResponse, RelayError>> {
        Box::pin(async move {
            info!("executing tool {} via relay", request.tool_name);
            let response = self
                .client
                .post(format!("{}{ROUTE_EXECUTE_TOOL}", self.base_url))
                .json(&request)
                .send()
                .await?;
            let response = ensure_success(response).await?;
            Ok(response.json().await?)
        })
    }
}

async fn ensure_success(response: Response) -> Result<Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!("tool relay request failed with status {status}");
    Err(RelayError::Status {
        status: status.as_u16(),
        body,
    })
}
