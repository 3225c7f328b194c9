//! Conversation history types
//!
//! Messages are created by the engine during a run and appended to the
//! caller-owned history. After creation only outcome metadata is attached.

mod history;

pub use history::{assemble_messages, to_chat_message, BUILTIN_SYSTEM_PROMPT};

pub use crate::llm::ToolCallRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// A unit of dialogue history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: MessageRole,
    /// May be empty for an assistant turn that only issues tool calls
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Tool calls issued by an assistant turn, in model order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    /// Correlation id of the request a tool-role message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Presentation-only outcome list for an assistant turn; never sent to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_outcomes: Option<Vec<ToolCallOutcome>>,
}

impl ConversationMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            tool_calls: None,
            tool_call_id: None,
            tool_outcomes: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Assistant turn; `tool_calls` is recorded even when empty
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    /// Plain assistant notice, e.g. a run-fatal error line
    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(MessageRole::Tool, content)
        }
    }

    /// Tool calls carried by this message, empty when none
    pub fn requested_calls(&self) -> &[ToolCallRequest] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Insert or replace the outcome with the same correlation id
    pub fn record_outcome(&mut self, outcome: &ToolCallOutcome) {
        let outcomes = self.tool_outcomes.get_or_insert_with(Vec::new);
        match outcomes.iter_mut().find(|o| o.id == outcome.id) {
            Some(existing) => *existing = outcome.clone(),
            None => outcomes.push(outcome.clone()),
        }
    }
}

/// Every correlation id already used by a request or reply in `messages`
pub fn correlation_ids<'a>(
    messages: impl IntoIterator<Item = &'a ConversationMessage>,
) -> HashSet<String> {
    let mut ids = HashSet::new();
    for msg in messages {
        ids.extend(msg.requested_calls().iter().map(|c| c.id.clone()));
        if let Some(id) = &msg.tool_call_id {
            ids.insert(id.clone());
        }
    }
    ids
}

/// Lifecycle of one tool dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Success,
    Error,
    /// Reserved for human approval; never produced by the engine
    Rejected,
}

impl ToolCallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Rejected)
    }
}

/// Result of dispatching one [`ToolCallRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub id: String,
    pub name: String,
    /// Parsed arguments; empty when parsing failed
    pub arguments: Map<String, Value>,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallOutcome {
    pub fn pending(call: &ToolCallRequest) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: Map::new(),
            status: ToolCallStatus::Pending,
            result: None,
            error: None,
        }
    }

    // Transitions are no-ops once the outcome is terminal.

    pub fn start(&mut self, arguments: Map<String, Value>) {
        if self.status == ToolCallStatus::Pending {
            self.arguments = arguments;
            self.status = ToolCallStatus::Running;
        }
    }

    pub fn succeed(&mut self, result: impl Into<String>) {
        if !self.status.is_terminal() {
            self.result = Some(result.into());
            self.status = ToolCallStatus::Success;
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.error = Some(error.into());
            self.status = ToolCallStatus::Error;
        }
    }
}
