//! MCP server runners for odata-mcp.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use odata_core::control::ReportingControlPlane;
use odata_core::upstream::UpstreamSource;
use odata_model::schema::ROUTE_HEALTH;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};

use crate::ODataMcp;

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    #[must_use]
    pub const fn with_sse_keep_alive(mut self, sse_keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = sse_keep_alive;
        self
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 4020)))
    }
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<S: UpstreamSource>(
    control: ReportingControlPlane<S>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = ODataMcp::new(control);
    let (stdin, stdout) = stdio();
    let running = serve_server(service, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Builds the HTTP router: the MCP service under `/mcp` plus `/health`.
pub fn streamable_http_router<S: UpstreamSource>(
    control: ReportingControlPlane<S>,
    config: &McpHttpServerConfig,
) -> Router {
    let service: StreamableHttpService<ODataMcp<S>, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(ODataMcp::new(control.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: config.sse_retry,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    Router::new()
        .route(ROUTE_HEALTH, get(|| async { "ok" }))
        .nest_service("/mcp", service)
}

/// Serves the MCP server using streamable HTTP transport.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http<S: UpstreamSource>(
    control: ReportingControlPlane<S>,
    config: McpHttpServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = streamable_http_router(control, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::testing::FixedSource;

    #[tokio::test]
    async fn health_route_answers_ok() {
        let app = streamable_http_router(
            ReportingControlPlane::new(FixedSource),
            &McpHttpServerConfig::default(),
        );
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.expect("body");
        assert_eq!(&body[..], b"ok");
    }

    #[test]
    fn default_config_is_stateful_on_localhost() {
        let config = McpHttpServerConfig::default().with_sse_keep_alive(None);
        assert!(config.stateful_mode);
        assert_eq!(config.addr.port(), 4020);
        assert!(config.addr.ip().is_loopback());
        assert_eq!(config.sse_keep_alive, None);
    }
}
