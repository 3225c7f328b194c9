//! Pure state transition function

use super::{Effect, Event, FinishCause, RunContext, RunPhase};
use crate::llm::wants_continuation;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: RunPhase,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: RunPhase) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Run already finished")]
    RunFinished,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

fn finished(cause: FinishCause) -> TransitionResult {
    TransitionResult::new(RunPhase::Finished { cause })
}

/// Start the next round, or finish if the cap is reached
fn next_round(completed: u32, context: &RunContext) -> TransitionResult {
    if completed >= context.max_iterations {
        return finished(FinishCause::IterationLimit);
    }
    let round = completed + 1;
    TransitionResult::new(RunPhase::Requesting { round })
        .with_effect(Effect::RequestCompletion { round })
}

/// Pure transition function
///
/// Same inputs always produce the same outputs; no I/O.
pub fn transition(
    state: &RunPhase,
    context: &RunContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (RunPhase::Finished { .. }, _) => Err(TransitionError::RunFinished),

        // Cancellation ends the run from any live phase. Messages already
        // appended stay; a tool round that was cut short is still published.
        (RunPhase::ExecutingTools { .. }, Event::Cancelled) => {
            Ok(finished(FinishCause::Cancelled).with_effect(Effect::PublishMessages))
        }
        (_, Event::Cancelled) => Ok(finished(FinishCause::Cancelled)),

        (RunPhase::Idle, Event::Start) => Ok(next_round(0, context)),

        (RunPhase::Requesting { round }, Event::CompletionReceived {
            tool_call_count,
            finish_reason,
        }) => {
            if tool_call_count == 0 {
                return Ok(finished(FinishCause::NoToolCalls).with_effect(Effect::RecordAssistant));
            }
            Ok(TransitionResult::new(RunPhase::ExecutingTools {
                round: *round,
                continue_after: wants_continuation(&finish_reason),
            })
            .with_effect(Effect::RecordAssistant)
            .with_effect(Effect::ExecuteTools))
        }

        (RunPhase::Requesting { .. }, Event::CompletionFailed { message }) => {
            Ok(finished(FinishCause::Failed).with_effects(Effect::fatal(message)))
        }

        (RunPhase::ExecutingTools {
            round,
            continue_after,
        }, Event::ToolsSettled) => {
            let result = if *continue_after {
                next_round(*round, context)
            } else {
                finished(FinishCause::ModelStopped)
            };
            // Publish precedes the next request
            let mut effects = vec![Effect::PublishMessages];
            effects.extend(result.effects);
            Ok(TransitionResult {
                new_state: result.new_state,
                effects,
            })
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in {state:?}"
        ))),
    }
}
