//! HTTP chat API served to the front-end.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use odata_model::schema::ROUTE_HEALTH;
use odata_model::{
    ChatMessageRequest,
    ChatMessageResponse,
    ClearSessionRequest,
    ToolExecutionRequest,
    ToolExecutionResponse,
    ToolsResponse,
};
use serde::Serialize;
use tracing::{error, info};

use crate::model::ChatModel;
use crate::relay_client::ToolRelay;
use crate::service::{ChatError, ChatService};
use crate::suggest::{canned_response, suggest_tools};

pub const ROUTE_CHAT_TOOLS: &str = "/api/chat/tools";
pub const ROUTE_CHAT_PROCESS: &str = "/api/chat/process";
pub const ROUTE_CHAT_EXECUTE_TOOL: &str = "/api/chat/execute-tool";
pub const ROUTE_CHAT_MESSAGE: &str = "/api/chat/message";
pub const ROUTE_CHAT_CLEAR: &str = "/api/chat/clear";

/// Configuration for the chat HTTP server.
#[derive(Debug, Clone)]
pub struct ChatServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl ChatServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(300),
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

impl Default for ChatServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 4030)))
    }
}

/// HTTP chat server wrapper.
pub struct ChatServer<M: ChatModel, R: ToolRelay> {
    config: ChatServerConfig,
    state: AppState<M, R>,
}

impl<M: ChatModel, R: ToolRelay> ChatServer<M, R> {
    #[must_use]
    pub const fn new(service: ChatService<M, R>, config: ChatServerConfig) -> Self {
        let state = AppState {
            service,
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

        info!("odata-chat listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

struct AppState<M: ChatModel, R: ToolRelay> {
    service: ChatService<M, R>,
    request_timeout: Duration,
}

impl<M: ChatModel, R: ToolRelay> Clone for AppState<M, R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
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
            message: "chat request timed out".to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => Self::bad_request(err.to_string()),
            ChatError::ModelUnavailable => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "chat is disabled: no chat model endpoint/deployment configured"
                    .to_string(),
            },
            ChatError::CapacityReached { .. } => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: err.to_string(),
            },
            ChatError::Model(model_err) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: model_err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse { error: self.message });
        (self.status, payload).into_response()
    }
}

fn build_router<M: ChatModel, R: ToolRelay>(
    state: AppState<M, R>,
    max_body_bytes: usize,
) -> Router {
    Router::new()
        .route(ROUTE_HEALTH, get(health))
        .route(ROUTE_CHAT_TOOLS, get(list_tools::<M, R>))
        .route(ROUTE_CHAT_PROCESS, post(process_message))
        .route(ROUTE_CHAT_EXECUTE_TOOL, post(execute_tool::<M, R>))
        .route(ROUTE_CHAT_MESSAGE, post(send_message::<M, R>))
        .route(ROUTE_CHAT_CLEAR, post(clear_session::<M, R>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_tools<M: ChatModel, R: ToolRelay>(
    State(state): State<AppState<M, R>>,
) -> Result<Json<ToolsResponse>, ApiError> {
    info!("fetching available tools");
    let tools = tokio::time::timeout(state.request_timeout, state.service.available_tools())
        .await
        .map_err(|_| ApiError::timeout())?
        .map_err(|err| {
            error!("failed to fetch tools: {err}");
            ApiError::internal("Failed to fetch tools from MCP")
        })?;
    Ok(Json(tools))
}

async fn process_message(
    Json(request): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }
    let suggested_tools = suggest_tools(&request.message);
    Ok(Json(ChatMessageResponse {
        response: canned_response(&suggested_tools),
        suggested_tools,
        session_id: request.session_id,
    }))
}

async fn execute_tool<M: ChatModel, R: ToolRelay>(
    State(state): State<AppState<M, R>>,
    Json(request): Json<ToolExecutionRequest>,
) -> Result<Response, ApiError> {
    if request.tool_name.trim().is_empty() {
        return Err(ApiError::bad_request("Tool name is required"));
    }
    let result = tokio::time::timeout(state.request_timeout, state.service.execute_tool(request))
        .await
        .map_err(|_| ApiError::timeout())?;
    Ok(match result {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            error!("error executing tool: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ToolExecutionResponse::failed(err.to_string())),
            )
                .into_response()
        }
    })
}

async fn send_message<M: ChatModel, R: ToolRelay>(
    State(state): State<AppState<M, R>>,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>, ApiError> {
    let response = tokio::time::timeout(state.request_timeout, state.service.send_message(request))
        .await
        .map_err(|_| ApiError::timeout())??;
    Ok(Json(response))
}

async fn clear_session<M: ChatModel, R: ToolRelay>(
    State(state): State<AppState<M, R>>,
    Json(request): Json<ClearSessionRequest>,
) -> Result<StatusCode, ApiError> {
    if state.service.clear_session(request.session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "unknown session: {}",
            request.session_id
        )))
    }
}
