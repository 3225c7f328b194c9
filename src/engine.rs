//! Agentic conversation engine
//!
//! Drives the iterate-call-execute-fold loop: each round assembles history,
//! streams a completion, records the assistant turn and dispatches its tool
//! calls in order. Progress is reported through an [`EngineObserver`].

mod executor;
mod observer;

#[cfg(test)]
pub mod testing;


pub use executor::ConversationEngine;
pub use observer::{BroadcastObserver, EngineEvent, EngineObserver, NoopObserver};

use crate::auth::{AuthError, AuthState};
use crate::conversation::ConversationMessage;
use crate::llm::LlmError;
use crate::state_machine::FinishCause;
use thiserror::Error;

/// Inputs for one run
#[derive(Debug, Clone)]
pub struct RunInput<'a> {
    /// Prior conversation, oldest first; never modified
    pub history: &'a [ConversationMessage],
    pub user_text: &'a str,
    /// Current credential state; changes are reported via `on_auth_update`
    pub auth: AuthState,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// New messages in order, starting with the user message
    pub messages: Vec<ConversationMessage>,
    /// Completion requests issued
    pub rounds: u32,
    pub finish: FinishCause,
}

/// Failures that end a run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Transport(#[from] LlmError),
    #[error("Cancelled")]
    Cancelled,
}
