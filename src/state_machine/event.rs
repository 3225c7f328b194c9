//! Events that drive a run

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The user message was recorded; begin the first round
    Start,

    /// A completion finished streaming
    CompletionReceived {
        tool_call_count: usize,
        finish_reason: String,
    },

    /// Credential refresh or transport failed outside of cancellation
    CompletionFailed { message: String },

    /// Every tool call of the current round has an outcome
    ToolsSettled,

    /// The run's cancellation signal was observed
    Cancelled,
}
