//! Request assembly
//!
//! Linearizes {system configuration, prior history, this run's messages} into
//! the payload the transport sends. Output is a pure function of the inputs.

use super::{ConversationMessage, MessageRole};
use crate::llm::{ChatMessage, Role, WireToolCall};

/// Fixed instruction sent after any operator prompt
pub const BUILTIN_SYSTEM_PROMPT: &str = r"You are an assistant working inside the user's note vault. You can inspect and change the vault only through the provided tools.

Rules for tool use:
- When an action is needed, perform it by calling the tool. Never describe a tool call in prose instead of making it, and never claim a change was made unless the tool call succeeded.
- Always read a file before editing it, so that edits are based on its current content.
- When a task touches several files, issue every necessary tool call in sequence until the task is complete. Do not stop after describing what you would do.
- Paths are relative to the vault root.
- If a tool returns an error, adjust and try again or explain the problem to the user.";

/// Translate one history message into its wire form
pub fn to_chat_message(msg: &ConversationMessage) -> ChatMessage {
    match msg.role {
        MessageRole::Tool => ChatMessage::tool_result(
            msg.tool_call_id.clone().unwrap_or_default(),
            msg.content.clone(),
        ),
        MessageRole::User | MessageRole::Assistant => {
            let role = if msg.role == MessageRole::User {
                Role::User
            } else {
                Role::Assistant
            };
            let calls = msg.requested_calls();
            if calls.is_empty() {
                ChatMessage {
                    role,
                    content: Some(msg.content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                }
            } else {
                // A tool-issuing turn may have no narrative text
                let content = if msg.content.trim().is_empty() {
                    None
                } else {
                    Some(msg.content.clone())
                };
                ChatMessage {
                    role,
                    content,
                    tool_calls: Some(calls.iter().map(WireToolCall::from).collect()),
                    tool_call_id: None,
                }
            }
        }
    }
}

/// Build the ordered message sequence for one completion request
pub fn assemble_messages(
    custom_system_prompt: &str,
    history: &[ConversationMessage],
    new_messages: &[ConversationMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + new_messages.len() + 2);

    if !custom_system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(custom_system_prompt));
    }
    messages.push(ChatMessage::system(BUILTIN_SYSTEM_PROMPT));

    messages.extend(history.iter().map(to_chat_message));
    messages.extend(new_messages.iter().map(to_chat_message));
    messages
}
