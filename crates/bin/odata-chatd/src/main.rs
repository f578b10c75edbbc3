//! Daemon entry point for the chat front-end.
//!
//! Serves the chat HTTP API, relaying tool calls to `odata-mcpd`'s discovery
//! API and conversations to a hosted OpenAI-compatible model.

mod config;

use odata_chat::model::{ChatModelConfig, OpenAiChatModel};
use odata_chat::relay_client::ToolRelayClient;
use odata_chat::server::{ChatServer, ChatServerConfig};
use odata_chat::service::ChatService;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::ChatConfig;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let config = ChatConfig::from_args()?;

    let relay = ToolRelayClient::new(&config.tool_relay_url, config.relay_timeout)?;
    info!("using tool relay at {}", relay.base_url());

    let model = match &config.model {
        Some(settings) => {
            let model = OpenAiChatModel::new(
                ChatModelConfig::new(settings.endpoint.clone(), settings.deployment.clone())
                    .with_api_key(settings.api_key.clone())
                    .with_api_version(settings.api_version.clone())
                    .with_timeout(config.model_timeout),
            )?;
            info!("chat model endpoint {}", model.url());
            Some(model)
        }
        None => {
            warn!(
                "chat model endpoint or deployment not configured; chat is disabled and only tool routes are served"
            );
            None
        }
    };

    let service = ChatService::new(relay, model)
        .with_max_tool_rounds(config.max_tool_rounds)
        .with_session_ttl(config.session_ttl)
        .with_max_sessions(config.max_sessions);
    let _sweeper = service.spawn_sweeper();
    info!(
        "holding at most {} chat sessions, evicted after {}s idle",
        config.max_sessions,
        config.session_ttl.as_secs()
    );
    let server = ChatServer::new(
        service,
        ChatServerConfig::new(config.addr)
            .with_max_body_bytes(config.max_body_bytes)
            .with_request_timeout(config.request_timeout),
    );
    server.serve().await
}
