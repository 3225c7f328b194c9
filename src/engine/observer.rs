//! Presentation callback surface

use crate::auth::AuthState;
use crate::conversation::{ConversationMessage, ToolCallOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Fire-and-forget notifications from a run
///
/// Callbacks are invoked on the run's task, in generation order.
pub trait EngineObserver: Send + Sync {
    /// Every message produced so far in this run
    fn on_message(&self, _messages: &[ConversationMessage]) {}

    fn on_content_delta(&self, _text: &str) {}

    /// A tool call outcome changed status
    fn on_tool_call(&self, _outcome: &ToolCallOutcome) {}

    /// A run-fatal error; cancellation is never reported here
    fn on_error(&self, _description: &str) {}

    fn on_debug(&self, _message: &str) {}

    /// Credential state changed and must be persisted before the next run
    fn on_auth_update(&self, _state: &AuthState) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}

/// Engine callbacks as data
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Messages {
        messages: Vec<ConversationMessage>,
    },
    ContentDelta {
        text: String,
    },
    ToolCall {
        outcome: ToolCallOutcome,
    },
    Error {
        message: String,
    },
    Debug {
        message: String,
    },
    /// Tokens are not forwarded
    AuthUpdated {
        expires_at: Option<DateTime<Utc>>,
    },
}

/// Fans engine callbacks out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl EngineObserver for BroadcastObserver {
    fn on_message(&self, messages: &[ConversationMessage]) {
        self.send(EngineEvent::Messages {
            messages: messages.to_vec(),
        });
    }

    fn on_content_delta(&self, text: &str) {
        self.send(EngineEvent::ContentDelta {
            text: text.to_string(),
        });
    }

    fn on_tool_call(&self, outcome: &ToolCallOutcome) {
        self.send(EngineEvent::ToolCall {
            outcome: outcome.clone(),
        });
    }

    fn on_error(&self, description: &str) {
        self.send(EngineEvent::Error {
            message: description.to_string(),
        });
    }

    fn on_debug(&self, message: &str) {
        self.send(EngineEvent::Debug {
            message: message.to_string(),
        });
    }

    fn on_auth_update(&self, state: &AuthState) {
        self.send(EngineEvent::AuthUpdated {
            expires_at: state.expires_at,
        });
    }
}
