//! Reassembly of streamed completion output
//!
//! Tool calls arrive as fragments keyed by index. Fragments for one index are
//! merged by appending argument text in arrival order and overwriting id/name
//! only when a fragment carries a non-empty value. Finalization is ordered by
//! index, never by first arrival.

use super::types::{CompletionResponse, StreamEvent, ToolCallFragment, ToolCallRequest};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Ordered merge table for tool-call fragments
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    pending: BTreeMap<u32, PendingToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: ToolCallFragment) {
        let entry = self.pending.entry(fragment.index).or_default();
        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            entry.id = id;
        }
        if let Some(name) = fragment.name.filter(|name| !name.is_empty()) {
            entry.name = name;
        }
        if let Some(arguments) = fragment.arguments {
            entry.arguments.push_str(&arguments);
        }
    }

    /// One request per distinct index, ascending
    pub fn finish(self) -> Vec<ToolCallRequest> {
        self.pending
            .into_values()
            .map(|p| ToolCallRequest {
                id: p.id,
                name: p.name,
                arguments: p.arguments,
            })
            .collect()
    }
}

/// Folds a whole completion stream into a [`CompletionResponse`]
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    content: String,
    tool_calls: ToolCallAccumulator,
    finish_reason: Option<String>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns `true` once the terminal event has been seen.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::ContentDelta(text) => {
                self.content.push_str(&text);
                false
            }
            StreamEvent::ToolCallDelta(fragment) => {
                self.tool_calls.push(fragment);
                false
            }
            StreamEvent::Done { finish_reason } => {
                self.finish_reason = Some(finish_reason);
                true
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.finish_reason.is_some()
    }

    pub fn finish(self) -> CompletionResponse {
        CompletionResponse {
            content: self.content,
            tool_calls: self.tool_calls.finish(),
            finish_reason: self.finish_reason.unwrap_or_default(),
        }
    }
}
