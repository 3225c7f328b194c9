//! SSE decoding for OpenAI-compatible chat completion streams
//!
//! Splits the body on blank lines, parses each `data:` payload as a chunk and
//! turns it into [`StreamEvent`]s. Tool-call fragments are passed through
//! untouched; merging them is the accumulator's job.

use super::error::LlmError;
use super::types::{StreamEvent, ToolCallFragment};
use super::CompletionStream;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Display;

/// Incremental decoder state
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    saw_tool_calls: bool,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>, LlmError> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_event_boundary(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw);
            self.process_event(&text, &mut events)?;
        }
        Ok(events)
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Result<Vec<StreamEvent>, LlmError> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let text = String::from_utf8_lossy(&raw).into_owned();
            self.process_event(&text, &mut events)?;
        }
        if !self.done {
            return Err(LlmError::invalid_response(
                "Completion stream ended without a finish reason",
            ));
        }
        Ok(events)
    }

    /// Handle `[DONE]`; a missing finish reason is inferred from what was seen
    fn close(&mut self, events: &mut Vec<StreamEvent>) {
        if !self.done {
            self.done = true;
            let finish_reason = if self.saw_tool_calls { "tool_calls" } else { "stop" };
            tracing::debug!(finish_reason, "[DONE] without finish_reason");
            events.push(StreamEvent::Done {
                finish_reason: finish_reason.to_string(),
            });
        }
    }

    fn process_event(&mut self, event: &str, out: &mut Vec<StreamEvent>) -> Result<(), LlmError> {
        if self.done {
            return Ok(());
        }

        let mut data = String::new();
        for line in event.lines() {
            if let Some(payload) = line.strip_prefix("data:") {
                let payload = payload.trim();
                if payload == "[DONE]" {
                    self.close(out);
                    return Ok(());
                }
                data.push_str(payload);
            }
        }

        if data.is_empty() {
            return Ok(()); // keep-alive or comment
        }

        let chunk: ChatCompletionChunk = serde_json::from_str(&data).map_err(|e| {
            LlmError::invalid_response(format!("Failed to parse stream chunk: {e} - data: {data}"))
        })?;

        let mut finish_reason = None;
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                out.push(StreamEvent::ContentDelta(content));
            }
            for (position, tc) in choice.delta.tool_calls.into_iter().flatten().enumerate() {
                self.saw_tool_calls = true;
                let (name, arguments) = tc
                    .function
                    .map_or((None, None), |f| (f.name, f.arguments));
                out.push(StreamEvent::ToolCallDelta(ToolCallFragment {
                    index: tc.index.unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX)),
                    id: tc.id,
                    name,
                    arguments,
                }));
            }
            if choice.finish_reason.is_some() {
                finish_reason = choice.finish_reason;
            }
        }

        if let Some(finish_reason) = finish_reason {
            self.done = true;
            out.push(StreamEvent::Done { finish_reason });
        }
        Ok(())
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Wrap a byte stream (typically `reqwest::Response::bytes_stream`) into a
/// completion event stream.
pub fn event_stream<S, B, E>(bytes: S) -> CompletionStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = (Box::pin(bytes), SseDecoder::new(), false);

    stream::unfold(state, |(mut bytes, mut decoder, finished)| async move {
        if finished {
            return None;
        }
        match bytes.next().await {
            Some(Ok(chunk)) => {
                let batch = decoder.push(chunk.as_ref());
                let failed = batch.is_err();
                Some((batch, (bytes, decoder, failed)))
            }
            Some(Err(e)) => Some((
                Err(LlmError::network(format!("Stream read error: {e}"))),
                (bytes, decoder, true),
            )),
            None => {
                let batch = decoder.finish();
                Some((batch, (bytes, decoder, true)))
            }
        }
    })
    .flat_map(|batch| {
        let items: Vec<Result<StreamEvent, LlmError>> = match batch {
            Ok(events) => events.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
    })
    .boxed()
}

/// Decode a non-streaming JSON completion body into the same event sequence
/// a stream would have produced.
pub fn decode_json_body(body: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let response: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::invalid_response(format!("Failed to parse response: {e} - body: {body}"))
    })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::invalid_response("No choices in response"))?;

    let mut events = Vec::new();
    if let Some(content) = choice.message.content.filter(|c| !c.is_empty()) {
        events.push(StreamEvent::ContentDelta(content));
    }

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    let has_tool_calls = !tool_calls.is_empty();
    for (index, tc) in (0u32..).zip(tool_calls) {
        events.push(StreamEvent::ToolCallDelta(ToolCallFragment {
            index,
            id: tc.id,
            name: Some(tc.function.name),
            arguments: Some(tc.function.arguments),
        }));
    }

    let finish_reason = choice.finish_reason.unwrap_or_else(|| {
        if has_tool_calls { "tool_calls" } else { "stop" }.to_string()
    });
    events.push(StreamEvent::Done { finish_reason });
    Ok(events)
}

// Streaming wire types

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunction>,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

// One-shot wire types

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
