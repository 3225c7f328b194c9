//! Property-based tests for the run loop
//!
//! A scripted model answers every request; the loop is driven purely through
//! `transition` and the effects it emits.

use super::*;
use proptest::prelude::*;

/// One scripted model answer
#[derive(Debug, Clone)]
struct Answer {
    tool_calls: usize,
    finish_reason: &'static str,
}

fn arb_finish_reason() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("tool_calls"),
        Just("function_call"),
        Just("stop"),
        Just("length"),
        Just(""),
    ]
}

fn arb_answer() -> impl Strategy<Value = Answer> {
    (0usize..4, arb_finish_reason()).prop_map(|(tool_calls, finish_reason)| Answer {
        tool_calls,
        finish_reason,
    })
}

/// Summary of a simulated run
#[derive(Debug)]
struct Simulation {
    rounds: u32,
    cause: FinishCause,
    recorded_assistants: u32,
    tool_phases: u32,
    reported_errors: u32,
}

/// Drive a run to completion. `cancel_at` injects a cancel before the Nth
/// effect is executed; `fail_round` makes that round's request fail.
fn simulate(
    max_iterations: u32,
    answers: &[Answer],
    cancel_at: Option<usize>,
    fail_round: Option<u32>,
) -> Simulation {
    let ctx = RunContext::new(max_iterations);
    let mut state = RunPhase::Idle;
    let mut sim = Simulation {
        rounds: 0,
        cause: FinishCause::Failed,
        recorded_assistants: 0,
        tool_phases: 0,
        reported_errors: 0,
    };
    let mut effects_seen = 0usize;
    let mut events = vec![Event::Start];

    while let Some(event) = events.pop() {
        let result = transition(&state, &ctx, event).expect("valid transition");
        state = result.new_state;

        for effect in result.effects {
            effects_seen += 1;
            if cancel_at == Some(effects_seen) && !state.is_finished() {
                events.push(Event::Cancelled);
                break;
            }
            match effect {
                Effect::RequestCompletion { round } => {
                    sim.rounds = round;
                    if fail_round == Some(round) {
                        events.push(Event::CompletionFailed {
                            message: "boom".into(),
                        });
                        continue;
                    }
                    let answer = &answers[(round as usize - 1) % answers.len()];
                    events.push(Event::CompletionReceived {
                        tool_call_count: answer.tool_calls,
                        finish_reason: answer.finish_reason.to_string(),
                    });
                }
                Effect::RecordAssistant => sim.recorded_assistants += 1,
                Effect::ExecuteTools => {
                    sim.tool_phases += 1;
                    events.push(Event::ToolsSettled);
                }
                Effect::ReportError { .. } => sim.reported_errors += 1,
                Effect::PublishMessages | Effect::AppendErrorMessage { .. } => {}
            }
        }
    }

    match state {
        RunPhase::Finished { cause } => sim.cause = cause,
        other => panic!("run did not finish: {other:?}"),
    }
    sim
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Rounds never exceed the cap, and every run terminates
    #[test]
    fn prop_rounds_bounded(
        max in 0u32..12,
        answers in proptest::collection::vec(arb_answer(), 1..6),
    ) {
        let sim = simulate(max, &answers, None, None);
        prop_assert!(sim.rounds <= max);
        prop_assert_eq!(sim.recorded_assistants, sim.rounds);
    }

    // A model that always requests tools and continues runs exactly `max` rounds
    #[test]
    fn prop_always_continuing_hits_cap(max in 1u32..15, calls in 1usize..4) {
        let answers = [Answer { tool_calls: calls, finish_reason: "tool_calls" }];
        let sim = simulate(max, &answers, None, None);
        prop_assert_eq!(sim.rounds, max);
        prop_assert_eq!(sim.tool_phases, max);
        prop_assert_eq!(sim.cause, FinishCause::IterationLimit);
        prop_assert_eq!(sim.reported_errors, 0);
    }

    // An answer without tool calls ends the run after one round
    #[test]
    fn prop_no_tool_calls_single_round(max in 1u32..15, reason in arb_finish_reason()) {
        let answers = [Answer { tool_calls: 0, finish_reason: reason }];
        let sim = simulate(max, &answers, None, None);
        prop_assert_eq!(sim.rounds, 1);
        prop_assert_eq!(sim.tool_phases, 0);
        prop_assert_eq!(sim.cause, FinishCause::NoToolCalls);
    }

    // A non-continuation reason still executes the tools, then stops
    #[test]
    fn prop_stop_reason_runs_tools_once(max in 1u32..15, calls in 1usize..4) {
        let answers = [Answer { tool_calls: calls, finish_reason: "stop" }];
        let sim = simulate(max, &answers, None, None);
        prop_assert_eq!(sim.rounds, 1);
        prop_assert_eq!(sim.tool_phases, 1);
        prop_assert_eq!(sim.cause, FinishCause::ModelStopped);
    }

    // Cancellation never reports an error and never starts a later round
    #[test]
    fn prop_cancel_is_silent(
        max in 1u32..8,
        answers in proptest::collection::vec(arb_answer(), 1..4),
        cancel_at in 1usize..20,
    ) {
        let full = simulate(max, &answers, None, None);
        let sim = simulate(max, &answers, Some(cancel_at), None);
        prop_assert_eq!(sim.reported_errors, 0);
        prop_assert!(sim.rounds <= full.rounds);
    }

    // A failed request is fatal: one error report, no further rounds
    #[test]
    fn prop_failure_is_fatal(max in 1u32..8, fail_round in 1u32..8) {
        let answers = [Answer { tool_calls: 1, finish_reason: "tool_calls" }];
        let sim = simulate(max, &answers, None, Some(fail_round));
        if fail_round <= max {
            prop_assert_eq!(sim.cause, FinishCause::Failed);
            prop_assert_eq!(sim.rounds, fail_round);
            prop_assert_eq!(sim.reported_errors, 1);
        } else {
            prop_assert_eq!(sim.cause, FinishCause::IterationLimit);
            prop_assert_eq!(sim.reported_errors, 0);
        }
    }
}
