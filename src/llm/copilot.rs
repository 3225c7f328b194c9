//! Copilot chat completions transport (`OpenAI`-compatible wire format)

use super::error::LlmError;
use super::sse::{decode_json_body, event_stream};
use super::types::{ChatMessage, CompletionRequest, ToolDefinition};
use super::{CompletionStream, CompletionTransport};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_COMPLETIONS_URL: &str = "https://api.githubcopilot.com/chat/completions";

const EDITOR_VERSION: &str = concat!("vault-copilot/", env!("CARGO_PKG_VERSION"));
const INTEGRATION_ID: &str = "vscode-chat";

/// Streaming transport for the Copilot chat completions endpoint
pub struct CopilotTransport {
    client: Client,
    url: String,
}

impl CopilotTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn translate_request(request: &CompletionRequest) -> ChatCompletionRequest<'_> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(WireTool::from).collect::<Vec<_>>())
        };
        let tool_choice = tools.as_ref().map(|_| "auto");

        ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            tools,
            tool_choice,
            temperature: 0.0,
            top_p: 1.0,
            n: 1,
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionTransport for CopilotTransport {
    async fn stream(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        let body = Self::translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header("Editor-Version", EDITOR_VERSION)
            .header("Copilot-Integration-Id", INTEGRATION_ID)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map_or(text, |resp| resp.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_event_stream {
            return Ok(event_stream(response.bytes_stream()));
        }

        // Some deployments ignore `stream: true` and answer in one shot
        tracing::debug!(url = %self.url, "Completion endpoint returned a non-streaming body");
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
        let events = decode_json_body(&text)?;
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }

    fn name(&self) -> &str {
        "copilot"
    }
}

// Copilot / OpenAI wire types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
    top_p: f32,
    n: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

impl<'a> From<&'a ToolDefinition> for WireTool<'a> {
    fn from(def: &'a ToolDefinition) -> Self {
        Self {
            r#type: "function",
            function: WireFunction {
                name: &def.name,
                description: &def.description,
                parameters: &def.input_schema,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
