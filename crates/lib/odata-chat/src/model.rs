//! Client for hosted OpenAI-compatible chat-completions models.
//!
//! Plain OpenAI-style endpoints are addressed as `{endpoint}/chat/completions`
//! with a bearer key and the deployment sent as `model`. When an API version
//! is configured the endpoint is treated as an Azure OpenAI resource:
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=..`
//! authenticated with the `api-key` header.

use std::{error::Error, fmt, time::Duration};

use futures::future::BoxFuture;
use odata_model::ToolDefinition;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::endpoint::normalize_base_url;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub enum ChatModelError {
    InvalidEndpoint(String),
    Status { status: u16, body: String },
    Transport(reqwest::Error),
    EmptyResponse,
}

impl fmt::Display for ChatModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint(value) => write!(f, "invalid chat model endpoint: {value}"),
            Self::Status { status, body } => {
                write!(f, "chat model returned status {status}: {body}")
            }
            Self::Transport(err) => write!(f, "chat model request failed: {err}"),
            Self::EmptyResponse => write!(f, "chat model returned no choices"),
        }
    }
}

impl Error for ChatModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatModelError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// One message of a conversation, in chat-completions wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Answer to the tool call `call_id`.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct FunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec<'a>,
}

impl<'a> From<&'a ToolDefinition> for ToolSpec<'a> {
    fn from(tool: &'a ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: FunctionSpec {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.input_schema,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

/// Seam between chat sessions and the hosted model.
pub trait ChatModel: Send + Sync + 'static {
    /// Produces the next assistant message for `messages`, offering `tools`.
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> BoxFuture<'a, Result<ChatMessage, ChatModelError>>;
}

/// Configuration for the hosted chat model.
#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub timeout: Duration,
}

impl ChatModelConfig {
    pub fn new(endpoint: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_key: None,
            api_version: None,
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, api_version: Option<String>) -> Self {
        self.api_version = api_version;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }
}

/// `reqwest`-backed chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: Client,
    config: ChatModelConfig,
    url: String,
}

impl OpenAiChatModel {
    /// Builds a client for the configured endpoint.
    ///
    /// # Errors
    /// Returns `ChatModelError::InvalidEndpoint` for anything but an http(s)
    /// endpoint or an empty deployment, or `ChatModelError::Transport` if the
    /// client cannot be built.
    pub fn new(config: ChatModelConfig) -> Result<Self, ChatModelError> {
        let url = completions_url(&config)?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChatModel for OpenAiChatModel {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> BoxFuture<'a, Result<ChatMessage, ChatModelError>> {
        Box::pin(async move {
            let body = CompletionRequest {
                model: (!self.config.is_azure()).then_some(self.config.deployment.as_str()),
                messages,
                tools: tools.iter().map(ToolSpec::from).collect(),
            };
            debug!(
                "requesting completion with {} messages and {} tools",
                messages.len(),
                tools.len()
            );

            let mut request = self.client.post(&self.url).json(&body);
            if let Some(api_key) = &self.config.api_key {
                request = if self.config.is_azure() {
                    request.header("api-key", api_key)
                } else {
                    request.bearer_auth(api_key)
                };
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ChatModelError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let completion: CompletionResponse = response.json().await?;
            completion
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message)
                .ok_or(ChatModelError::EmptyResponse)
        })
    }
}

fn completions_url(config: &ChatModelConfig) -> Result<String, ChatModelError> {
    let endpoint = normalize_base_url(&config.endpoint)
        .ok_or_else(|| ChatModelError::InvalidEndpoint(config.endpoint.clone()))?;
    let deployment = config.deployment.trim();
    if deployment.is_empty() {
        return Err(ChatModelError::InvalidEndpoint(format!(
            "{endpoint} (missing deployment)"
        )));
    }
    Ok(match &config.api_version {
        Some(version) => format!(
            "{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}"
        ),
        None => format!("{endpoint}/chat/completions"),
    })
}
