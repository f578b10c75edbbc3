//! HTTP tool discovery server for odata-mcp.
//!
//! Lets non-MCP clients (such as the chat front-end) list the reporting tools
//! and execute them by name over plain JSON.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use odata_core::control::{ControlError, ReportingControlPlane};
use odata_core::upstream::UpstreamSource;
use odata_model::schema::{ROUTE_EXECUTE_TOOL, ROUTE_HEALTH, ROUTE_TOOLS};
use odata_model::{ToolExecutionRequest, ToolExecutionResponse, ToolsResponse};
use serde::Serialize;
use tracing::info;

/// Configuration for the discovery HTTP server.
#[derive(Debug, Clone)]
pub struct DiscoveryServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl DiscoveryServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(150),
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for DiscoveryServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 4010)))
    }
}

/// HTTP discovery server wrapper.
pub struct DiscoveryServer<S: UpstreamSource> {
    config: DiscoveryServerConfig,
    state: AppState<S>,
}

impl<S: UpstreamSource> DiscoveryServer<S> {
    #[must_use]
    pub const fn new(control: ReportingControlPlane<S>, config: DiscoveryServerConfig) -> Self {
        let state = AppState {
            control,
            request_timeout: config.request_timeout,
        };
        Self { config, state }
    }

    /// Router without a bound listener.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.max_body_bytes)
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = build_router(self.state, self.config.max_body_bytes);

        info!("odata-discovery listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

struct AppState<S: UpstreamSource> {
    control: ReportingControlPlane<S>,
    request_timeout: Duration,
}

impl<S: UpstreamSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn timeout() -> Self {
        Self {
            status: StatusCode::REQUEST_TIMEOUT,
            message: "tool request timed out".to_string(),
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::UnknownTool(_) => Self::not_found(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse { error: self.message });
        (self.status, payload).into_response()
    }
}

fn build_router<S: UpstreamSource>(state: AppState<S>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(ROUTE_HEALTH, get(health))
        .route(ROUTE_TOOLS, get(list_tools::<S>))
        .route(ROUTE_EXECUTE_TOOL, post(execute_tool::<S>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_tools<S: UpstreamSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<ToolsResponse>, ApiError> {
    let tools = tokio::time::timeout(state.request_timeout, state.control.list_tools())
        .await
        .map_err(|_| ApiError::timeout())?;
    Ok(Json(tools))
}

async fn execute_tool<S: UpstreamSource>(
    State(state): State<AppState<S>>,
    Json(request): Json<ToolExecutionRequest>,
) -> Result<Json<ToolExecutionResponse>, ApiError> {
    let tool_name = request.tool_name.trim();
    if tool_name.is_empty() {
        return Err(ApiError::bad_request("toolName is required"));
    }
    let request = ToolExecutionRequest {
        tool_name: tool_name.to_string(),
        input: request.input,
    };
    let response = tokio::time::timeout(state.request_timeout, state.control.execute_tool(request))
        .await
        .map_err(|_| ApiError::timeout())??;
    Ok(Json(response))
}
