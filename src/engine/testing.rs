//! Mock implementations for testing
//!
//! These mocks let the engine run end to end without network or disk.

use super::EngineObserver;
use crate::auth::{AccessToken, AuthState, TokenRefresher};
use crate::conversation::{ConversationMessage, ToolCallOutcome};
use crate::llm::{
    CompletionRequest, CompletionStream, CompletionTransport, LlmError, StreamEvent,
    ToolCallFragment, ToolDefinition,
};
use crate::tools::{ToolError, ToolExecutor};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Transport
// ============================================================================

/// Transport that replays queued event scripts
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Vec<Result<StreamEvent, LlmError>>, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
    /// Bearer tokens presented, one per request
    pub tokens: Mutex<Vec<String>>,
    /// Cancelled when the next request arrives, before it is answered
    cancel_on_request: Mutex<Option<CancellationToken>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            cancel_on_request: Mutex::new(None),
        }
    }

    /// Queue a raw event script
    pub fn queue_events(&self, events: Vec<StreamEvent>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(events.into_iter().map(Ok).collect()));
    }

    /// Queue a script that fails partway through
    pub fn queue_stream_error(&self, before: Vec<StreamEvent>, error: LlmError) {
        let mut script: Vec<_> = before.into_iter().map(Ok).collect();
        script.push(Err(error));
        self.responses.lock().unwrap().push_back(Ok(script));
    }

    /// Queue a response; each tool call is `(id, name, arguments)`
    pub fn queue_response(&self, content: &str, tool_calls: &[(&str, &str, &str)], finish_reason: &str) {
        self.queue_events(script(content, tool_calls, finish_reason));
    }

    /// Queue a failure to open the stream
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn cancel_on_next_request(&self, token: CancellationToken) {
        *self.cancel_on_request.lock().unwrap() = Some(token);
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Event script for one response, with each tool call split in two fragments
pub fn script(content: &str, tool_calls: &[(&str, &str, &str)], finish_reason: &str) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if !content.is_empty() {
        let mid = content.char_indices().nth(content.chars().count() / 2).map_or(0, |(i, _)| i);
        let (a, b) = content.split_at(mid);
        for part in [a, b] {
            if !part.is_empty() {
                events.push(StreamEvent::ContentDelta(part.to_string()));
            }
        }
    }
    for (i, (id, name, args)) in tool_calls.iter().enumerate() {
        let index = u32::try_from(i).unwrap();
        let mid = args.char_indices().nth(args.chars().count() / 2).map_or(0, |(i, _)| i);
        let (head, tail) = args.split_at(mid);
        events.push(StreamEvent::ToolCallDelta(ToolCallFragment {
            index,
            id: Some((*id).to_string()),
            name: Some((*name).to_string()),
            arguments: Some(head.to_string()),
        }));
        events.push(StreamEvent::ToolCallDelta(ToolCallFragment {
            index,
            id: None,
            name: None,
            arguments: Some(tail.to_string()),
        }));
    }
    events.push(StreamEvent::Done {
        finish_reason: finish_reason.to_string(),
    });
    events
}

#[async_trait]
impl CompletionTransport for MockTransport {
    async fn stream(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.tokens.lock().unwrap().push(token.to_string());
        if let Some(cancel) = self.cancel_on_request.lock().unwrap().take() {
            cancel.cancel();
        }
        let script = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))?;
        Ok(stream::iter(script).boxed())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Tool executor with predefined outputs
pub struct MockToolExecutor {
    outputs: HashMap<String, Result<String, ToolError>>,
    definitions: Vec<ToolDefinition>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(String, Map<String, Value>)>>,
    /// Cancelled as soon as an execution starts
    cancel_after_first: Option<CancellationToken>,
    /// Tools that never return
    hanging: Vec<String>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            definitions: Vec::new(),
            executions: Mutex::new(Vec::new()),
            cancel_after_first: None,
            hanging: Vec::new(),
        }
    }

    /// Add a tool with a predefined output
    pub fn with_tool(mut self, name: &str, output: &str) -> Self {
        self.declare(name);
        self.outputs.insert(name.to_string(), Ok(output.to_string()));
        self
    }

    /// Add a tool that always fails
    pub fn with_failing_tool(mut self, name: &str, error: ToolError) -> Self {
        self.declare(name);
        self.outputs.insert(name.to_string(), Err(error));
        self
    }

    /// Add a tool that ignores its cancellation token and never finishes
    pub fn with_hanging_tool(mut self, name: &str) -> Self {
        self.declare(name);
        self.hanging.push(name.to_string());
        self
    }

    pub fn cancelling_after_first(mut self, token: CancellationToken) -> Self {
        self.cancel_after_first = Some(token);
        self
    }

    fn declare(&mut self, name: &str) {
        self.definitions.push(ToolDefinition {
            name: name.to_string(),
            description: format!("Mock {name}"),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        });
    }

    pub fn recorded_executions(&self) -> Vec<(String, Map<String, Value>)> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(
        &self,
        name: &str,
        args: Map<String, Value>,
        _cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), args));
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }
        if self.hanging.iter().any(|h| h == name) {
            std::future::pending::<()>().await;
        }
        self.outputs
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(ToolError::UnknownTool(name.to_string())))
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

// ============================================================================
// Mock Token Refresher
// ============================================================================

/// Refresher that mints numbered tokens valid for an hour
#[derive(Default)]
pub struct MockRefresher {
    pub calls: AtomicUsize,
}

impl MockRefresher {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for MockRefresher {
    async fn refresh(&self, github_token: &str) -> Result<AccessToken, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken {
            token: format!("{github_token}-access-{n}"),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

/// Auth state that will refresh on first use
pub fn signed_in() -> AuthState {
    AuthState::with_github_token("gh")
}

// ============================================================================
// Recording Observer
// ============================================================================

/// Observer that records every callback
#[derive(Default)]
pub struct RecordingObserver {
    pub message_snapshots: Mutex<Vec<Vec<ConversationMessage>>>,
    pub deltas: Mutex<Vec<String>>,
    pub outcomes: Mutex<Vec<ToolCallOutcome>>,
    pub errors: Mutex<Vec<String>>,
    pub debug: Mutex<Vec<String>>,
    pub auth_updates: Mutex<Vec<AuthState>>,
    /// Cancelled on the first `on_message`
    cancel_on_first_message: Mutex<Option<CancellationToken>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_on_first_message(token: CancellationToken) -> Self {
        Self {
            cancel_on_first_message: Mutex::new(Some(token)),
            ..Self::default()
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn outcomes(&self) -> Vec<ToolCallOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn deltas(&self) -> Vec<String> {
        self.deltas.lock().unwrap().clone()
    }

    pub fn last_snapshot(&self) -> Vec<ConversationMessage> {
        self.message_snapshots
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

impl EngineObserver for RecordingObserver {
    fn on_message(&self, messages: &[ConversationMessage]) {
        self.message_snapshots.lock().unwrap().push(messages.to_vec());
        if let Some(token) = self.cancel_on_first_message.lock().unwrap().take() {
            token.cancel();
        }
    }

    fn on_content_delta(&self, text: &str) {
        self.deltas.lock().unwrap().push(text.to_string());
    }

    fn on_tool_call(&self, outcome: &ToolCallOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    fn on_error(&self, description: &str) {
        self.errors.lock().unwrap().push(description.to_string());
    }

    fn on_debug(&self, message: &str) {
        self.debug.lock().unwrap().push(message.to_string());
    }

    fn on_auth_update(&self, state: &AuthState) {
        self.auth_updates.lock().unwrap().push(state.clone());
    }
}
