//! Completion transport abstraction
//!
//! The engine talks to the model service through [`CompletionTransport`],
//! which yields a finite stream of [`StreamEvent`]s ending in `Done`.

pub mod accumulator;
mod copilot;
mod error;
pub mod sse;
mod types;

#[cfg(test)]
mod proptests;

pub use accumulator::{ResponseAccumulator, ToolCallAccumulator};
pub use copilot::{CopilotTransport, DEFAULT_COMPLETIONS_URL};
pub use error::{LlmError, LlmErrorKind};
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Single-consumer stream of completion events
pub type CompletionStream = BoxStream<'static, Result<StreamEvent, LlmError>>;

/// Sends one completion request to the model service
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Open a completion stream for `request`, authenticated with `token`
    async fn stream(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: CompletionTransport + ?Sized> CompletionTransport for Arc<T> {
    async fn stream(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        (**self).stream(token, request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: CompletionTransport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: CompletionTransport> CompletionTransport for LoggingTransport<T> {
    async fn stream(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.stream(token, request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    transport = %self.inner.name(),
                    model = %request.model,
                    messages = request.messages.len(),
                    tools = request.tools.len(),
                    duration_ms = %duration.as_millis(),
                    "Completion stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    transport = %self.inner.name(),
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Completion request failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
