//! Effects produced by state transitions

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Refresh the credential, assemble history and stream a completion
    RequestCompletion { round: u32 },

    /// Append the round's assistant message and publish the message list
    RecordAssistant,

    /// Dispatch the round's tool calls sequentially
    ExecuteTools,

    /// Publish the new-message list to the observer
    PublishMessages,

    /// Append an `Error: ...` assistant message and publish
    AppendErrorMessage { message: String },

    /// Notify the observer of a run-fatal error
    ReportError { message: String },
}

impl Effect {
    pub fn fatal(message: impl Into<String>) -> [Self; 2] {
        let message = message.into();
        [
            Effect::AppendErrorMessage {
                message: message.clone(),
            },
            Effect::ReportError { message },
        ]
    }
}
