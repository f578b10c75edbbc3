use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;
use odata_model::{ToolDefinition, ToolExecutionRequest, ToolExecutionResponse, ToolsResponse};
use serde_json::json;
use tokio::sync::Mutex;

use crate::model::{ChatMessage, ChatModel, ChatModelError, FunctionCall, Role, ToolCall};
use crate::relay_client::{RelayError, ToolRelay};

pub struct SeenRequest {
    pub messages: Vec<ChatMessage>,
    pub tool_count: usize,
}

/// Replays scripted assistant messages and records every request.
#[derive(Clone)]
pub struct ScriptedModel {
    script: Arc<Mutex<VecDeque<ChatMessage>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ChatMessage>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn seen(&self) -> Vec<SeenRequest> {
        self.seen
            .lock()
            .await
            .iter()
            .map(|request| SeenRequest {
                messages: request.messages.clone(),
                tool_count: request.tool_count,
            })
            .collect()
    }
}

impl ChatModel for ScriptedModel {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> BoxFuture<'a, Result<ChatMessage, ChatModelError>> {
        Box::pin(async move {
            self.seen.lock().await.push(SeenRequest {
                messages: messages.to_vec(),
                tool_count: tools.len(),
            });
            self.script
                .lock()
                .await
                .pop_front()
                .ok_or(ChatModelError::EmptyResponse)
        })
    }
}

pub fn tool_call(id: &str, name: &str, arguments: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
        tool_call_id: None,
    }
}

/// Relay answering `result of {tool}` unless the tool is marked failing.
#[derive(Clone, Default)]
pub struct StubRelay {
    list_calls: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<(String, String)>>>,
    failures: Vec<(String, String)>,
}

impl StubRelay {
    pub fn failing(mut self, tool: &str, error: &str) -> Self {
        self.failures.push((tool.to_string(), error.to_string()));
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn executed(&self) -> Vec<(String, String)> {
        self.executed.lock().await.clone()
    }
}

impl ToolRelay for StubRelay {
    fn list_tools(&self) -> BoxFuture<'_, Result<ToolsResponse, RelayError>> {
        Box::pin(async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolsResponse {
                tools: vec![
                    ToolDefinition {
                        name: "GetData".to_string(),
                        description: "Run an OData query".to_string(),
                        input_schema: json!({
                            "type": "object",
                            "properties": { "query": { "type": "string" } },
                            "required": ["query"]
                        }),
                    },
                    ToolDefinition {
                        name: "GetODataMetadata".to_string(),
                        description: "Describe entity sets".to_string(),
                        input_schema: json!({ "type": "object", "properties": {}, "required": [] }),
                    },
                ],
            })
        })
    }

    fn execute_tool(
        &self,
        request: ToolExecutionRequest,
    ) -> BoxFuture<'_, Result<ToolExecutionResponse, RelayError>> {
        Box::pin(async move {
            self.executed
                .lock()
                .await
                .push((request.tool_name.clone(), request.input.clone()));
            let failure = self
                .failures
                .iter()
                .find(|(tool, _)| *tool == request.tool_name);
            Ok(match failure {
                Some((_, error)) => ToolExecutionResponse::failed(error.clone()),
                None => ToolExecutionResponse::ok(format!("result of {}", request.tool_name)),
            })
        })
    }
}
