//! Run executor
//!
//! Applies the pure transitions from [`crate::state_machine`] and performs
//! their effects. Everything in a run is sequential: one completion at a
//! time, one tool dispatch at a time.

use super::{EngineObserver, RunError, RunInput, RunReport};
use crate::auth::{ensure_valid_token, AuthState, TokenRefresher};
use crate::config::EngineConfig;
use crate::conversation::{
    assemble_messages, correlation_ids, ConversationMessage, ToolCallOutcome, ToolCallRequest,
};
use crate::llm::{
    CompletionRequest, CompletionResponse, CompletionTransport, LlmError, ResponseAccumulator,
    StreamEvent,
};
use crate::state_machine::{
    transition, Effect, Event, FinishCause, RunContext, RunPhase,
};
use crate::tools::ToolExecutor;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-invocation state, owned by exactly one run
struct RunState<'a> {
    history: &'a [ConversationMessage],
    new_messages: Vec<ConversationMessage>,
    phase: RunPhase,
    auth: AuthState,
    /// Completion awaiting `RecordAssistant`
    pending: Option<CompletionResponse>,
    /// Index in `new_messages` of the round's assistant message
    current_assistant: Option<usize>,
    /// Correlation ids already in use across history and this run
    used_ids: HashSet<String>,
    rounds: u32,
}

/// Conversation engine over a transport, a tool executor and a token source
pub struct ConversationEngine<T, X, R>
where
    T: CompletionTransport + 'static,
    X: ToolExecutor + 'static,
    R: TokenRefresher + 'static,
{
    config: EngineConfig,
    transport: Arc<T>,
    tools: Arc<X>,
    refresher: Arc<R>,
}

impl<T, X, R> ConversationEngine<T, X, R>
where
    T: CompletionTransport + 'static,
    X: ToolExecutor + 'static,
    R: TokenRefresher + 'static,
{
    pub fn new(config: EngineConfig, transport: T, tools: X, refresher: R) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            tools: Arc::new(tools),
            refresher: Arc::new(refresher),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one run to completion
    ///
    /// Never fails: run-fatal errors end up as an `Error: ...` assistant
    /// message plus an `on_error` notification. Callers must not start a
    /// second run on the same conversation until this one returns.
    pub async fn run(
        &self,
        input: RunInput<'_>,
        observer: &dyn EngineObserver,
        cancel: &CancellationToken,
    ) -> RunReport {
        let start = Instant::now();
        let context = RunContext::new(self.config.max_iterations);
        let mut run = RunState {
            history: input.history,
            new_messages: vec![ConversationMessage::user(input.user_text)],
            phase: RunPhase::Idle,
            auth: input.auth,
            pending: None,
            current_assistant: None,
            used_ids: correlation_ids(input.history),
            rounds: 0,
        };

        tracing::info!(
            model = %self.config.model,
            max_iterations = self.config.max_iterations,
            history = run.history.len(),
            "Starting run"
        );

        // Process events in a loop - no recursion
        let mut events_to_process = vec![Event::Start];
        while let Some(event) = events_to_process.pop() {
            let result = match transition(&run.phase, &context, event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, phase = ?run.phase, round = ?run.phase.round(), "Rejected transition");
                    break;
                }
            };
            run.phase = result.new_state;

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(effect, &mut run, observer, cancel).await
                {
                    events_to_process.push(generated);
                }
            }
        }

        let finish = match run.phase {
            RunPhase::Finished { cause } => cause,
            _ => FinishCause::Failed,
        };
        tracing::info!(
            rounds = run.rounds,
            finish = %finish,
            messages = run.new_messages.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Run finished"
        );

        RunReport {
            messages: run.new_messages,
            rounds: run.rounds,
            finish,
        }
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(
        &self,
        effect: Effect,
        run: &mut RunState<'_>,
        observer: &dyn EngineObserver,
        cancel: &CancellationToken,
    ) -> Option<Event> {
        match effect {
            Effect::RequestCompletion { round } => {
                if cancel.is_cancelled() {
                    debug(observer, "Cancelled before next request");
                    return Some(Event::Cancelled);
                }
                run.rounds = round;
                debug(observer, &format!("Round {round}: requesting completion"));

                match self.request_completion(run, observer, cancel).await {
                    Ok(response) => {
                        let event = Event::CompletionReceived {
                            tool_call_count: response.tool_calls.len(),
                            finish_reason: response.finish_reason.clone(),
                        };
                        run.pending = Some(response);
                        Some(event)
                    }
                    // A failure that coincides with cancellation is not an error
                    Err(_) if cancel.is_cancelled() => {
                        tracing::info!(round, "Completion cancelled");
                        Some(Event::Cancelled)
                    }
                    Err(e) => Some(Event::CompletionFailed {
                        message: e.to_string(),
                    }),
                }
            }

            Effect::RecordAssistant => {
                let response = run.pending.take().unwrap_or_default();
                let calls = assign_unique_ids(response.tool_calls, &mut run.used_ids);
                run.new_messages
                    .push(ConversationMessage::assistant(response.content, calls));
                run.current_assistant = Some(run.new_messages.len() - 1);
                observer.on_message(&run.new_messages);
                None
            }

            Effect::ExecuteTools => Some(self.execute_tools(run, observer, cancel).await),

            Effect::PublishMessages => {
                observer.on_message(&run.new_messages);
                None
            }

            Effect::AppendErrorMessage { message } => {
                run.new_messages
                    .push(ConversationMessage::assistant_text(format!("Error: {message}")));
                observer.on_message(&run.new_messages);
                None
            }

            Effect::ReportError { message } => {
                tracing::error!(error = %message, "Run failed");
                observer.on_error(&message);
                None
            }
        }
    }

    /// Refresh credentials, send the request and drain the stream
    async fn request_completion(
        &self,
        run: &mut RunState<'_>,
        observer: &dyn EngineObserver,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse, RunError> {
        let ensured = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RunError::Cancelled),
            ensured = ensure_valid_token(&mut run.auth, &*self.refresher) => ensured?,
        };
        if ensured.refreshed {
            observer.on_auth_update(&run.auth);
        }

        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: assemble_messages(
                &self.config.custom_system_prompt,
                run.history,
                &run.new_messages,
            ),
            tools: self.tools.definitions(),
        };

        let mut stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RunError::Cancelled),
            opened = self.transport.stream(&ensured.token, &request) => opened?,
        };

        let mut acc = ResponseAccumulator::new();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RunError::Cancelled),
                next = stream.next() => next,
            };
            let Some(event) = next else { break };
            let event = event?;
            match &event {
                StreamEvent::ContentDelta(text) => observer.on_content_delta(text),
                StreamEvent::ToolCallDelta(fragment) => {
                    if let Some(name) = fragment.name.as_deref().filter(|n| !n.is_empty()) {
                        debug(observer, &format!("Model requested tool {name}"));
                    }
                }
                StreamEvent::Done { .. } => {}
            }
            if acc.apply(event) {
                break;
            }
        }

        if !acc.is_done() {
            return Err(LlmError::invalid_response(
                "Completion stream ended without a finish reason",
            )
            .into());
        }
        let response = acc.finish();
        tracing::debug!(
            content_len = response.content.len(),
            tool_calls = response.tool_calls.len(),
            finish_reason = %response.finish_reason,
            "Completion received"
        );
        Ok(response)
    }

    /// Dispatch the round's tool calls in order
    async fn execute_tools(
        &self,
        run: &mut RunState<'_>,
        observer: &dyn EngineObserver,
        cancel: &CancellationToken,
    ) -> Event {
        let Some(index) = run.current_assistant else {
            return Event::ToolsSettled;
        };
        let calls = run.new_messages[index].requested_calls().to_vec();

        for call in calls {
            if cancel.is_cancelled() {
                tracing::info!(tool = %call.name, "Cancelled; skipping remaining tool calls");
                return Event::Cancelled;
            }

            let mut outcome = ToolCallOutcome::pending(&call);
            publish_outcome(run, index, &outcome, observer);

            let args = match parse_arguments(&call) {
                Ok(args) => args,
                Err(description) => {
                    tracing::warn!(tool = %call.name, error = %description, "Malformed tool arguments");
                    outcome.fail(description.clone());
                    publish_outcome(run, index, &outcome, observer);
                    run.new_messages
                        .push(ConversationMessage::tool(&call.id, format!("Error: {description}")));
                    continue;
                }
            };

            outcome.start(args.clone());
            publish_outcome(run, index, &outcome, observer);

            let dispatched = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = self.tools.execute(&call.name, args, cancel.clone()) => Some(result),
            };
            let Some(result) = dispatched else {
                tracing::info!(tool = %call.name, "Cancelled during tool execution");
                outcome.fail("Cancelled");
                publish_outcome(run, index, &outcome, observer);
                return Event::Cancelled;
            };

            let content = match result {
                Ok(result) => {
                    outcome.succeed(result.clone());
                    result
                }
                Err(e) => {
                    let description = e.to_string();
                    outcome.fail(description.clone());
                    format!("Error: {description}")
                }
            };
            publish_outcome(run, index, &outcome, observer);
            run.new_messages
                .push(ConversationMessage::tool(&call.id, content));
        }

        Event::ToolsSettled
    }
}

fn debug(observer: &dyn EngineObserver, message: &str) {
    tracing::debug!("{message}");
    observer.on_debug(message);
}

/// Attach the outcome to the round's assistant message and notify
fn publish_outcome(
    run: &mut RunState<'_>,
    index: usize,
    outcome: &ToolCallOutcome,
    observer: &dyn EngineObserver,
) {
    run.new_messages[index].record_outcome(outcome);
    observer.on_tool_call(outcome);
}

/// Replace empty or already-used correlation ids with fresh ones
fn assign_unique_ids(
    calls: Vec<ToolCallRequest>,
    used: &mut HashSet<String>,
) -> Vec<ToolCallRequest> {
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.trim().is_empty() || used.contains(&call.id) {
                let fresh = format!("call_{}", uuid::Uuid::new_v4().simple());
                tracing::debug!(old = %call.id, new = %fresh, "Reassigned tool call id");
                call.id = fresh;
            }
            used.insert(call.id.clone());
            call
        })
        .collect()
}

/// Parse a tool call's argument text into a JSON object
///
/// Blank text means no arguments. The error names the tool and quotes the
/// raw text.
pub(crate) fn parse_arguments(call: &ToolCallRequest) -> Result<Map<String, Value>, String> {
    let raw = &call.arguments;
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!(
            "Invalid arguments for {}: expected a JSON object, got: {raw}",
            call.name
        )),
        Err(e) => Err(format!(
            "Invalid JSON arguments for {}: {e}. Arguments were: {raw}",
            call.name
        )),
    }
}
