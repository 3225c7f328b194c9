//! Property-based tests for tool-call fragment reassembly
//!
//! - Arrival order across different indices never changes the result
//! - Which fragment carries the id/name never changes the result
//! - Argument text is the in-order concatenation of its fragments

use super::accumulator::ToolCallAccumulator;
use super::types::{ToolCallFragment, ToolCallRequest};
use proptest::prelude::*;

/// A logical call plus how it was cut into fragments
#[derive(Debug, Clone)]
struct SplitCall {
    id: String,
    name: String,
    arguments: String,
    /// Fragment boundaries within `arguments`, in chars
    cuts: Vec<usize>,
    /// Which fragment carries id and name
    carrier: usize,
}

fn arb_split_call() -> impl Strategy<Value = SplitCall> {
    (
        "call_[a-z0-9]{6}",
        "vault_[a-z_]{3,12}",
        "[a-z0-9{}\":, /]{0,40}",
        proptest::collection::vec(0usize..40, 0..4),
        0usize..5,
    )
        .prop_map(|(id, name, arguments, raw_cuts, carrier)| {
            let len = arguments.chars().count();
            let mut cuts: Vec<usize> = raw_cuts.into_iter().map(|c| c.min(len)).collect();
            cuts.sort_unstable();
            cuts.dedup();
            let fragment_count = cuts.len() + 1;
            SplitCall {
                id,
                name,
                arguments,
                cuts,
                carrier: carrier % fragment_count,
            }
        })
}

fn fragments_for(index: u32, call: &SplitCall) -> Vec<ToolCallFragment> {
    let chars: Vec<char> = call.arguments.chars().collect();
    let mut bounds = vec![0];
    bounds.extend(call.cuts.iter().copied());
    bounds.push(chars.len());

    bounds
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let piece: String = chars.iter().skip(w[0]).take(w[1] - w[0]).collect();
            let carries = i == call.carrier;
            ToolCallFragment {
                index,
                id: carries.then(|| call.id.clone()),
                name: carries.then(|| call.name.clone()),
                arguments: Some(piece),
            }
        })
        .collect()
}

/// Interleave per-index fragment queues following `picks`, preserving the
/// order within each index.
fn interleave(mut queues: Vec<Vec<ToolCallFragment>>, picks: &[usize]) -> Vec<ToolCallFragment> {
    for q in &mut queues {
        q.reverse();
    }
    let mut out = Vec::new();
    let mut picks = picks.iter().copied().cycle();
    while queues.iter().any(|q| !q.is_empty()) {
        let live: Vec<usize> = (0..queues.len()).filter(|i| !queues[*i].is_empty()).collect();
        let choice = live[picks.next().unwrap_or(0) % live.len()];
        if let Some(fragment) = queues[choice].pop() {
            out.push(fragment);
        }
    }
    out
}

fn merge(fragments: Vec<ToolCallFragment>) -> Vec<ToolCallRequest> {
    let mut acc = ToolCallAccumulator::new();
    for fragment in fragments {
        acc.push(fragment);
    }
    acc.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_merge_reconstructs_every_call(
        calls in proptest::collection::vec(arb_split_call(), 1..5),
        picks in proptest::collection::vec(0usize..8, 1..16),
    ) {
        let queues: Vec<_> = (0u32..).zip(&calls).map(|(i, c)| fragments_for(i, c)).collect();
        let merged = merge(interleave(queues, &picks));

        let expected: Vec<_> = calls
            .iter()
            .map(|c| ToolCallRequest::new(&c.id, &c.name, &c.arguments))
            .collect();
        prop_assert_eq!(merged, expected);
    }

    #[test]
    fn prop_arrival_order_across_indices_is_irrelevant(
        calls in proptest::collection::vec(arb_split_call(), 2..5),
        picks_a in proptest::collection::vec(0usize..8, 1..16),
        picks_b in proptest::collection::vec(0usize..8, 1..16),
    ) {
        let queues: Vec<_> = (0u32..).zip(&calls).map(|(i, c)| fragments_for(i, c)).collect();
        let a = merge(interleave(queues.clone(), &picks_a));
        let b = merge(interleave(queues, &picks_b));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_carrier_position_is_irrelevant(call in arb_split_call(), other in 0usize..5) {
        let mut moved = call.clone();
        moved.carrier = other % (call.cuts.len() + 1);

        let a = merge(fragments_for(0, &call));
        let b = merge(fragments_for(0, &moved));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_one_request_per_distinct_index(indices in proptest::collection::vec(0u32..6, 1..20)) {
        let mut acc = ToolCallAccumulator::new();
        for index in &indices {
            acc.push(ToolCallFragment { index: *index, arguments: Some("x".into()), ..Default::default() });
        }
        let mut distinct = indices.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(acc.finish().len(), distinct.len());
    }
}
