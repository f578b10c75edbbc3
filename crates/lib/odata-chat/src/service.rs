//! Chat sessions backed by the hosted model and the tool relay.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use std::{error::Error, fmt, sync::Arc};

use odata_model::{
    ChatMessageRequest,
    ChatMessageResponse,
    ToolDefinition,
    ToolExecutionRequest,
    ToolExecutionResponse,
    ToolsResponse,
};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::model::{ChatMessage, ChatModel, ChatModelError, ToolCall};
use crate::relay_client::{RelayError, ToolRelay};

pub const SYSTEM_PROMPT: &str = "You are an intelligent OData reporting assistant. You have access to MCP (Model Context Protocol) tools that allow you to query and explore OData data sources.

When users ask questions about their data:
1. Use the GetData tool to execute OData queries against the reporting database
2. Always use GetODataMetadata first to understand available entity sets if needed
3. Format your queries using proper OData syntax with $filter, $select, $orderby, etc.
4. Present results in a clear, readable format
5. Explain what data you retrieved and what it means

Always try to be helpful and provide insights from the data. If a query fails, explain why and suggest alternatives.";

/// Tool-call rounds allowed per user message before the model must answer.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub enum ChatError {
    EmptyMessage,
    ModelUnavailable,
    CapacityReached { max: usize },
    Model(ChatModelError),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "Message cannot be empty"),
            Self::ModelUnavailable => write!(f, "chat model is not configured"),
            Self::CapacityReached { max } => {
                write!(f, "chat session capacity reached (max {max})")
            }
            Self::Model(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ChatModelError> for ChatError {
    fn from(err: ChatModelError) -> Self {
        Self::Model(err)
    }
}

type History = Vec<ChatMessage>;

/// Stored conversation and the last time a turn completed on it.
struct Session {
    history: History,
    last_used: Instant,
}

impl Session {
    fn new(history: History) -> Self {
        Self {
            history,
            last_used: Instant::now(),
        }
    }
}

/// Conversation state shared by every handler clone.
///
/// Sessions idle for longer than the TTL are evicted by [`Self::evict_idle`]
/// (and the background sweeper), and at most `max_sessions` conversations
/// are held at once.
pub struct ChatService<M: ChatModel, R: ToolRelay> {
    model: Option<Arc<M>>,
    relay: Arc<R>,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    tools: Arc<RwLock<Option<Vec<ToolDefinition>>>>,
    max_tool_rounds: usize,
    session_ttl: Option<Duration>,
    max_sessions: Option<usize>,
    sweep_interval: Duration,
}

impl<M: ChatModel, R: ToolRelay> Clone for ChatService<M, R> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            relay: self.relay.clone(),
            sessions: self.sessions.clone(),
            tools: self.tools.clone(),
            max_tool_rounds: self.max_tool_rounds,
            session_ttl: self.session_ttl,
            max_sessions: self.max_sessions,
            sweep_interval: self.sweep_interval,
        }
    }
}

impl<M: ChatModel, R: ToolRelay> ChatService<M, R> {
    /// Creates a service; without a model only the tool routes work.
    pub fn new(relay: R, model: Option<M>) -> Self {
        Self {
            model: model.map(Arc::new),
            relay: Arc::new(relay),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            tools: Arc::new(RwLock::new(None)),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            session_ttl: None,
            max_sessions: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = Some(max_sessions);
        self
    }

    #[must_use]
    pub const fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub const fn is_chat_enabled(&self) -> bool {
        self.model.is_some()
    }

    /// Fetches the tool list from the relay, bypassing the cache.
    ///
    /// # Errors
    /// Returns the relay error when the relay is unreachable or answers non-2xx.
    pub async fn available_tools(&self) -> Result<ToolsResponse, RelayError> {
        self.relay.list_tools().await
    }

    /// Fetches and caches the tools offered to the model. Failures are logged
    /// and leave the cache empty so the next message retries.
    pub async fn initialize_tools(&self) -> usize {
        info!("initializing tools from relay");
        match self.relay.list_tools().await {
            Ok(response) => {
                let count = response.tools.len();
                *self.tools.write().await = Some(response.tools);
                info!("initialized {count} tools");
                count
            }
            Err(err) => {
                error!("error initializing tools: {err}");
                0
            }
        }
    }

    async fn model_tools(&self) -> Vec<ToolDefinition> {
        if let Some(tools) = self.tools.read().await.as_ref() {
            return tools.clone();
        }
        self.initialize_tools().await;
        self.tools.read().await.clone().unwrap_or_default()
    }

    /// Executes a tool through the relay.
    ///
    /// # Errors
    /// Returns the relay error when the relay is unreachable or answers non-2xx.
    pub async fn execute_tool(
        &self,
        request: ToolExecutionRequest,
    ) -> Result<ToolExecutionResponse, RelayError> {
        self.relay.execute_tool(request).await
    }

    /// Sends one user message, running any tool calls the model requests.
    ///
    /// # Errors
    /// Returns `ChatError::EmptyMessage` for blank input,
    /// `ChatError::ModelUnavailable` when no model is configured,
    /// `ChatError::CapacityReached` when a new session would exceed the
    /// session cap and `ChatError::Model` when the model call fails. A failed
    /// turn leaves the stored history untouched.
    pub async fn send_message(
        &self,
        request: ChatMessageRequest,
    ) -> Result<ChatMessageResponse, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let Some(model) = self.model.as_ref() else {
            return Err(ChatError::ModelUnavailable);
        };

        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
        info!("processing chat message for session {session_id}");
        self.ensure_capacity(session_id).await?;

        let mut history = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .map(|session| session.history.clone())
            .unwrap_or_default();
        if history.is_empty() {
            history.push(ChatMessage::system(SYSTEM_PROMPT));
        }
        history.push(ChatMessage::user(request.message));

        let tools = self.model_tools().await;
        let mut used_tools: Vec<String> = Vec::new();
        let mut reply = model.complete(&history, &tools).await?;
        let mut rounds = 0;
        while !reply.tool_calls.is_empty() {
            let calls = reply.tool_calls.clone();
            history.push(reply);
            for call in &calls {
                if !used_tools.contains(&call.function.name) {
                    used_tools.push(call.function.name.clone());
                }
                let output = self.run_tool_call(call).await;
                history.push(ChatMessage::tool_result(call.id.clone(), output));
            }
            rounds += 1;
            let offered: &[ToolDefinition] = if rounds < self.max_tool_rounds {
                &tools
            } else {
                warn!("tool round limit reached for session {session_id}");
                &[]
            };
            reply = model.complete(&history, offered).await?;
            if offered.is_empty() {
                reply.tool_calls.clear();
            }
        }

        let response = reply.content.clone().unwrap_or_default();
        history.push(reply);
        {
            let mut sessions = self.sessions.write().await;
            if let Some(max) = self.max_sessions
                && !sessions.contains_key(&session_id)
                && sessions.len() >= max
            {
                return Err(ChatError::CapacityReached { max });
            }
            sessions.insert(session_id, Session::new(history));
        }

        Ok(ChatMessageResponse {
            response,
            suggested_tools: used_tools,
            session_id: Some(session_id),
        })
    }

    async fn ensure_capacity(&self, session_id: Uuid) -> Result<(), ChatError> {
        let Some(max) = self.max_sessions else {
            return Ok(());
        };
        if self.has_room(session_id, max).await {
            return Ok(());
        }
        self.evict_idle().await;
        if self.has_room(session_id, max).await {
            return Ok(());
        }
        warn!("chat session capacity reached (max {max})");
        Err(ChatError::CapacityReached { max })
    }

    async fn has_room(&self, session_id: Uuid, max: usize) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(&session_id) || sessions.len() < max
    }

    async fn run_tool_call(&self, call: &ToolCall) -> String {
        let request = ToolExecutionRequest {
            tool_name: call.function.name.clone(),
            input: call.function.arguments.clone(),
        };
        match self.relay.execute_tool(request).await {
            Ok(response) if response.success => response.result,
            Ok(response) => response
                .error
                .unwrap_or_else(|| format!("Error: tool {} failed", call.function.name)),
            Err(err) => {
                error!("error executing tool {}: {err}", call.function.name);
                format!("Error: {err}")
            }
        }
    }

    /// Drops a session's history. Returns whether the session existed.
    pub async fn clear_session(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        if removed {
            info!("conversation history cleared for session {session_id}");
        }
        removed
    }

    /// Snapshot of a session's history.
    pub async fn history(&self, session_id: Uuid) -> Option<Vec<ChatMessage>> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|session| session.history.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for longer than the TTL. Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let Some(ttl) = self.session_ttl else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_used.elapsed() <= ttl);
        let evicted = before.saturating_sub(sessions.len());
        if evicted > 0 {
            info!("evicted {evicted} idle chat sessions");
        }
        evicted
    }

    /// Starts the periodic idle sweep. Returns `None` when no TTL is set.
    pub fn spawn_sweeper(&self) -> Option<tokio::task::JoinHandle<()>> {
        self.session_ttl?;
        let interval = self.sweep_interval;
        let service = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                service.evict_idle().await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::Role;
    use crate::testing::{ScriptedModel, StubRelay, tool_call};

    use super::*;

    fn message(text: &str, session_id: Option<Uuid>) -> ChatMessageRequest {
        ChatMessageRequest {
            message: text.to_string(),
            session_id,
        }
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let service = ChatService::new(StubRelay::default(), Some(ScriptedModel::new(vec![])));
        let result = service.send_message(message("  ", None)).await;
        assert!(matches!(result, Err(ChatError::EmptyMessage)));
    }

    #[tokio::test]
    async fn missing_model_disables_chat() {
        let service: ChatService<ScriptedModel, StubRelay> =
            ChatService::new(StubRelay::default(), None);
        assert!(!service.is_chat_enabled());
        let result = service.send_message(message("hello", None)).await;
        assert!(matches!(result, Err(ChatError::ModelUnavailable)));
    }

    #[tokio::test]
    async fn first_message_starts_with_system_prompt() {
        let model = ScriptedModel::new(vec![ChatMessage::assistant("Hi!")]);
        let service = ChatService::new(StubRelay::default(), Some(model));

        let response = service
            .send_message(message("hello", None))
            .await
            .expect("chat should succeed");
        let session_id = response.session_id.expect("session id");
        assert_eq!(response.response, "Hi!");
        assert!(response.suggested_tools.is_empty());

        let history = service.history(session_id).await.expect("history stored");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], ChatMessage::system(SYSTEM_PROMPT));
        assert_eq!(history[1], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn follow_up_messages_share_history() {
        let model = ScriptedModel::new(vec![
            ChatMessage::assistant("first"),
            ChatMessage::assistant("second"),
        ]);
        let service = ChatService::new(StubRelay::default(), Some(model));

        let first = service
            .send_message(message("one", None))
            .await
            .expect("first turn");
        let session_id = first.session_id;
        let second = service
            .send_message(message("two", session_id))
            .await
            .expect("second turn");

        assert_eq!(second.session_id, session_id);
        let history = service
            .history(session_id.expect("session id"))
            .await
            .expect("history stored");
        let system_count = history.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(system_count, 1);
        assert_eq!(history.len(), 5);
    }

    #[tokio::test]
    async fn tool_calls_are_executed_and_fed_back() {
        let model = ScriptedModel::new(vec![
            tool_call("call_1", "GetODataMetadata", "{}"),
            tool_call("call_2", "GetData", r#"{"query":"/Customers?$top=1"}"#),
            ChatMessage::assistant("There is one customer."),
        ]);
        let relay = StubRelay::default();
        let service = ChatService::new(relay.clone(), Some(model.clone()));

        let response = service
            .send_message(message("show me a customer", None))
            .await
            .expect("chat should succeed");

        assert_eq!(response.response, "There is one customer.");
        assert_eq!(response.suggested_tools, vec!["GetODataMetadata", "GetData"]);
        assert_eq!(
            relay.executed().await,
            vec![
                ("GetODataMetadata".to_string(), "{}".to_string()),
                ("GetData".to_string(), r#"{"query":"/Customers?$top=1"}"#.to_string()),
            ]
        );

        let seen = model.seen().await;
        assert_eq!(seen.len(), 3);
        let last_request = &seen[2];
        assert_eq!(last_request.tool_count, 2);
        assert_eq!(
            last_request.messages.last(),
            Some(&ChatMessage::tool_result("call_2", "result of GetData"))
        );
    }

    #[tokio::test]
    async fn failed_tools_report_error_text_to_model() {
        let model = ScriptedModel::new(vec![
            tool_call("call_1", "GetData", "{}"),
            ChatMessage::assistant("That query failed."),
        ]);
        let relay = StubRelay::default().failing("GetData", "Error: 'query' parameter not provided.");
        let service = ChatService::new(relay, Some(model.clone()));

        service
            .send_message(message("get data", None))
            .await
            .expect("chat should succeed");

        let seen = model.seen().await;
        assert_eq!(
            seen[1].messages.last(),
            Some(&ChatMessage::tool_result(
                "call_1",
                "Error: 'query' parameter not provided."
            ))
        );
    }

    #[tokio::test]
    async fn tool_rounds_are_bounded() {
        let model = ScriptedModel::new(vec![
            tool_call("call_1", "GetData", "{}"),
            tool_call("call_2", "GetData", "{}"),
            tool_call("call_3", "GetData", "{}"),
        ]);
        let service = ChatService::new(StubRelay::default(), Some(model.clone()))
            .with_max_tool_rounds(2);

        let response = service
            .send_message(message("loop forever", None))
            .await
            .expect("chat should succeed");

        let seen = model.seen().await;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].tool_count, 0);
        assert_eq!(response.response, "");
        let history = service
            .history(response.session_id.expect("session id"))
            .await
            .expect("history stored");
        assert!(history.last().is_some_and(|last| last.tool_calls.is_empty()));
    }

    #[tokio::test]
    async fn model_failure_leaves_history_untouched() {
        let model = ScriptedModel::new(vec![]);
        let service = ChatService::new(StubRelay::default(), Some(model));
        let session_id = Uuid::new_v4();

        let result = service.send_message(message("hello", Some(session_id))).await;

        assert!(matches!(result, Err(ChatError::Model(_))));
        assert!(service.history(session_id).await.is_none());
    }

    #[tokio::test]
    async fn tools_are_cached_after_first_message() {
        let model = ScriptedModel::new(vec![
            ChatMessage::assistant("one"),
            ChatMessage::assistant("two"),
        ]);
        let relay = StubRelay::default();
        let service = ChatService::new(relay.clone(), Some(model));

        service.send_message(message("a", None)).await.expect("first");
        service.send_message(message("b", None)).await.expect("second");

        assert_eq!(relay.list_calls(), 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let model = ScriptedModel::new(vec![ChatMessage::assistant("hi")]);
        let service = ChatService::new(StubRelay::default(), Some(model))
            .with_session_ttl(Duration::from_millis(20));
        let response = service
            .send_message(message("hello", None))
            .await
            .expect("chat should succeed");
        let session_id = response.session_id.expect("session id");
        assert_eq!(service.evict_idle().await, 0);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(service.evict_idle().await, 1);
        assert_eq!(service.session_count().await, 0);
        assert!(service.history(session_id).await.is_none());
    }

    #[tokio::test]
    async fn sessions_are_kept_without_ttl() {
        let model = ScriptedModel::new(vec![ChatMessage::assistant("hi")]);
        let service = ChatService::new(StubRelay::default(), Some(model));
        service.send_message(message("hello", None)).await.expect("chat");

        assert_eq!(service.evict_idle().await, 0);
        assert_eq!(service.session_count().await, 1);
        assert!(service.spawn_sweeper().is_none());
    }

    #[tokio::test]
    async fn session_cap_rejects_new_sessions_only() {
        let model = ScriptedModel::new(vec![
            ChatMessage::assistant("first"),
            ChatMessage::assistant("second"),
        ]);
        let service = ChatService::new(StubRelay::default(), Some(model.clone()))
            .with_max_sessions(1);

        let first = service
            .send_message(message("one", None))
            .await
            .expect("first session");
        let rejected = service.send_message(message("another", None)).await;
        assert!(matches!(rejected, Err(ChatError::CapacityReached { max: 1 })));
        assert_eq!(model.seen().await.len(), 1);

        let follow_up = service
            .send_message(message("two", first.session_id))
            .await
            .expect("existing session keeps working");
        assert_eq!(follow_up.response, "second");
        assert_eq!(service.session_count().await, 1);
    }

    #[tokio::test]
    async fn session_cap_reclaims_idle_sessions() {
        let model = ScriptedModel::new(vec![
            ChatMessage::assistant("first"),
            ChatMessage::assistant("second"),
        ]);
        let service = ChatService::new(StubRelay::default(), Some(model))
            .with_max_sessions(1)
            .with_session_ttl(Duration::from_millis(20));

        let first = service.send_message(message("one", None)).await.expect("first");
        tokio::time::sleep(Duration::from_millis(60)).await;
        let second = service.send_message(message("two", None)).await.expect("second");

        assert_ne!(first.session_id, second.session_id);
        assert_eq!(service.session_count().await, 1);
        assert!(
            service
                .history(first.session_id.expect("session id"))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn sweeper_evicts_in_the_background() {
        let model = ScriptedModel::new(vec![ChatMessage::assistant("hi")]);
        let service = ChatService::new(StubRelay::default(), Some(model))
            .with_session_ttl(Duration::from_millis(20))
            .with_sweep_interval(Duration::from_millis(10));
        service.send_message(message("hello", None)).await.expect("chat");

        let sweeper = service.spawn_sweeper().expect("sweeper should start");
        tokio::time::sleep(Duration::from_millis(150)).await;
        sweeper.abort();

        assert_eq!(service.session_count().await, 0);
    }

    #[tokio::test]
    async fn clearing_a_session_forgets_it() {
        let model = ScriptedModel::new(vec![ChatMessage::assistant("hi")]);
        let service = ChatService::new(StubRelay::default(), Some(model));
        let response = service
            .send_message(message("hello", None))
            .await
            .expect("chat should succeed");
        let session_id = response.session_id.expect("session id");

        assert!(service.clear_session(session_id).await);
        assert!(!service.clear_session(session_id).await);
        assert!(service.history(session_id).await.is_none());
    }
}
