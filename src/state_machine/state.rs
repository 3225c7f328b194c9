//! Run phases

use serde::{Deserialize, Serialize};

/// Why a run reached [`RunPhase::Finished`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishCause {
    /// The model answered without requesting tools
    NoToolCalls,
    /// Tools were requested but the finish reason did not ask for another round
    ModelStopped,
    /// The configured round cap was reached
    IterationLimit,
    Cancelled,
    /// A credential or transport failure ended the run
    Failed,
}

impl FinishCause {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoToolCalls => "no_tool_calls",
            Self::ModelStopped => "model_stopped",
            Self::IterationLimit => "iteration_limit",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FinishCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a single engine run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunPhase {
    /// Run created, nothing sent yet
    #[default]
    Idle,

    /// Completion request for `round` in flight (1-based)
    Requesting { round: u32 },

    /// Dispatching the tool calls of `round`, in order
    ExecutingTools {
        round: u32,
        /// Finish reason of the round asked for another round
        continue_after: bool,
    },

    /// Terminal for the run
    Finished { cause: FinishCause },
}

impl RunPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunPhase::Finished { .. })
    }

    /// Rounds started so far
    pub fn round(&self) -> Option<u32> {
        match self {
            RunPhase::Requesting { round } | RunPhase::ExecutingTools { round, .. } => {
                Some(*round)
            }
            RunPhase::Idle | RunPhase::Finished { .. } => None,
        }
    }
}

/// Immutable per-run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    /// Cap on full request/response rounds
    pub max_iterations: u32,
}

impl RunContext {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }
}
