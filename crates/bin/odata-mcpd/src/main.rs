//! Daemon entry point for the OData reporting MCP server.
//!
//! Loads configuration from CLI flags and the environment, builds the
//! reporting control plane, and serves MCP (stdio and/or streamable HTTP)
//! alongside the HTTP tool discovery API.

mod config;

use futures::future::{self, FutureExt, LocalBoxFuture};
use odata_core::control::ReportingControlPlane;
use odata_core::upstream::{ODataClient, ODataClientConfig};
use odata_discovery::{DiscoveryServer, DiscoveryServerConfig};
use odata_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::ODataConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let config = ODataConfig::from_args()?;

    let client = ODataClient::new(
        &ODataClientConfig::new(config.api_base_url.clone()).with_timeout(config.http_timeout),
    )?;
    info!("relaying OData queries to {}", client.base_url());
    let control = ReportingControlPlane::with_cache_expiration(client, config.metadata_cache);

    let mut transports: Vec<LocalBoxFuture<'static, Result<(), BoxError>>> = Vec::new();
    if config.discovery_serve {
        let server = DiscoveryServer::new(
            control.clone(),
            DiscoveryServerConfig::new(config.discovery_addr)
                .with_max_body_bytes(config.discovery_max_body_bytes)
                .with_request_timeout(config.discovery_timeout),
        );
        transports.push(server.serve().boxed_local());
    }
    if config.mcp_serve {
        let mcp_config = McpHttpServerConfig::new(config.mcp_http_addr)
            .with_stateful_mode(config.mcp_stateful);
        info!("odata-mcp streamable HTTP listening on {}", config.mcp_http_addr);
        transports.push(serve_streamable_http(control.clone(), mcp_config).boxed_local());
    }
    if config.enable_stdio {
        info!("serving MCP over stdio");
        transports.push(serve_stdio(control).boxed_local());
    }

    if transports.is_empty() {
        return Ok(());
    }
    // The first transport to stop ends the daemon.
    let (result, _, _) = future::select_all(transports).await;
    result
}
