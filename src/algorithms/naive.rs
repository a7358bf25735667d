use std::collections::VecDeque;

use tracing::trace;

use super::Equivalence;
use crate::lts::{LabelIndex, Lts, StateIndex};
use crate::Map;

/// Outgoing transitions with hidden labels replaced by `tau`.
fn successor_lists(lts: &Lts) -> Vec<Vec<(LabelIndex, StateIndex)>> {
    let mut succ = vec![Vec::new(); lts.num_states()];
    for t in lts.transitions() {
        succ[t.from].push((lts.apply_hidden_label_map(t.label), t.to));
    }
    succ
}

/// The states reachable from `s` by `tau` steps that stay in the class of `s`,
/// including `s` itself.
fn inert_reach(succ: &[Vec<(LabelIndex, StateIndex)>], class: &[usize], tau: LabelIndex, s: StateIndex) -> Vec<StateIndex> {
    let mut seen = vec![false; succ.len()];
    let mut queue = VecDeque::from([s]);
    let mut reach = Vec::new();
    seen[s] = true;
    while let Some(u) = queue.pop_front() {
        reach.push(u);
        for &(label, v) in &succ[u] {
            if label == tau && class[v] == class[s] && !seen[v] {
                seen[v] = true;
                queue.push_back(v);
            }
        }
    }
    reach
}

/// Whether `s` lies on a cycle of `tau` steps inside its class.
fn on_inert_cycle(succ: &[Vec<(LabelIndex, StateIndex)>], class: &[usize], tau: LabelIndex, s: StateIndex) -> bool {
    succ[s]
        .iter()
        .filter(|&&(label, v)| label == tau && class[v] == class[s])
        .any(|&(_, v)| inert_reach(succ, class, tau, v).contains(&s))
}

/// Computes the class of every state modulo `equivalence` by repeatedly
/// splitting classes according to state signatures. Takes O(n^2 m) time per
/// round and is only meant for checking the partitioner on small inputs.
///
/// Class numbers are dense and assigned in order of first occurrence.
pub fn partition(lts: &Lts, equivalence: Equivalence) -> Vec<usize> {
    let n = lts.num_states();
    let tau = lts.tau_label();
    let succ = successor_lists(lts);
    let mut class = vec![0usize; n];
    let mut count = usize::from(n > 0);

    loop {
        let divergent: Vec<bool> = (0..n)
            .map(|s| equivalence.preserve_divergence() && on_inert_cycle(&succ, &class, tau, s))
            .collect();
        let mut ids: Map<(usize, Vec<(LabelIndex, usize)>, bool), usize> = Map::default();
        let mut next = Vec::with_capacity(n);
        for s in 0..n {
            let reach = if equivalence.branching() {
                inert_reach(&succ, &class, tau, s)
            } else {
                vec![s]
            };
            let mut signature: Vec<(LabelIndex, usize)> = reach
                .iter()
                .flat_map(|&u| succ[u].iter())
                .filter(|&&(label, v)| !(equivalence.branching() && label == tau && class[v] == class[s]))
                .map(|&(label, v)| (label, class[v]))
                .collect();
            signature.sort_unstable();
            signature.dedup();
            let diverges = reach.iter().any(|&u| divergent[u]);
            let fresh = ids.len();
            next.push(*ids.entry((class[s], signature, diverges)).or_insert(fresh));
        }
        let new_count = ids.len();
        class = next;
        trace!("signature round produced {} classes", new_count);
        if new_count == count {
            return class;
        }
        count = new_count;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn strong_chain() {
        let lts = Lts::from_edges(4, [(0, "a", 1), (1, "a", 2), (3, "a", 2)]).unwrap();
        assert_eq!(partition(&lts, Equivalence::Strong), vec![0, 1, 2, 1]);
    }

    #[test]
    fn long_tau_cycle_diverges() {
        // 0 -tau-> 1 -tau-> 2 -tau-> 0 and 3 without transitions
        let lts = Lts::from_edges(4, [(0, "tau", 1), (1, "tau", 2), (2, "tau", 0)]).unwrap();
        assert_eq!(partition(&lts, Equivalence::Branching), vec![0, 0, 0, 0]);
        assert_eq!(partition(&lts, Equivalence::DivergencePreservingBranching), vec![0, 0, 0, 1]);
    }

    #[test]
    fn empty_system() {
        let lts = Lts::from_edges(1, []).unwrap();
        assert_eq!(partition(&lts, Equivalence::Branching), vec![0]);
    }
}
