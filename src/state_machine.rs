//! Run-loop state machine
//!
//! Pure transitions: given a phase and an event, produce the next phase and
//! the effects the engine must perform. All I/O lives in the engine.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{FinishCause, RunContext, RunPhase};
pub use transition::{transition, TransitionError, TransitionResult};
