use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};

use crate::lts::{Lts, StateIndex};
use crate::partitioner::Partitioner;

/// Strongly connected components of the `tau` graph and their contraction.
pub mod scc;

/// A slow but simple signature-based refinement, used to cross-check the
/// partitioner.
pub mod naive;

/// The equivalences a transition system can be reduced modulo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Equivalence {
    /// Strong bisimulation; `tau` is an ordinary label.
    #[default]
    Strong,
    /// Branching bisimulation.
    Branching,
    /// Divergence-preserving branching bisimulation.
    DivergencePreservingBranching,
}

impl Equivalence {
    /// All equivalences, in order of decreasing discriminating power.
    pub const ALL: [Equivalence; 3] = [
        Equivalence::Strong,
        Equivalence::DivergencePreservingBranching,
        Equivalence::Branching,
    ];

    /// Whether `tau` steps within a class are invisible.
    pub fn branching(self) -> bool {
        !matches!(self, Equivalence::Strong)
    }

    /// Whether divergent states are distinguished from non-divergent ones.
    pub fn preserve_divergence(self) -> bool {
        matches!(self, Equivalence::DivergencePreservingBranching)
    }

    /// The name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Equivalence::Strong => "bisim",
            Equivalence::Branching => "branching-bisim",
            Equivalence::DivergencePreservingBranching => "dpbranching-bisim",
        }
    }
}

impl fmt::Display for Equivalence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Raised when parsing an unknown equivalence name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown equivalence `{0}`; expected one of bisim, branching-bisim, dpbranching-bisim")]
pub struct UnknownEquivalence(pub String);

impl FromStr for Equivalence {
    type Err = UnknownEquivalence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Equivalence::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| UnknownEquivalence(s.to_string()))
    }
}

/// The class of every state of `lts` modulo `equivalence`. Class numbers are
/// dense, starting at 0; `lts` is left unchanged.
pub fn bisimulation_partition(lts: &Lts, equivalence: Equivalence) -> Vec<usize> {
    if equivalence.branching() {
        let mut reduced = lts.clone();
        let component = scc::scc_reduce(&mut reduced, equivalence.preserve_divergence());
        let partitioner = Partitioner::new(&reduced, true, equivalence.preserve_divergence());
        component.iter().map(|&c| partitioner.get_eq_class(c)).collect()
    } else {
        Partitioner::new(lts, false, false).classes()
    }
}

/// Replaces `lts` by its quotient modulo `equivalence`. Hidden labels become
/// `tau` in the result.
pub fn bisimulation_reduce(lts: &mut Lts, equivalence: Equivalence) {
    let (states, transitions) = (lts.num_states(), lts.num_transitions());
    if equivalence.branching() {
        scc::scc_reduce(lts, equivalence.preserve_divergence());
    }
    let partitioner = Partitioner::new(lts, equivalence.branching(), equivalence.preserve_divergence());
    partitioner.replace_transition_system(lts);
    info!(
        "reduced {} states and {} transitions to {} states and {} transitions modulo {}",
        states,
        transitions,
        lts.num_states(),
        lts.num_transitions(),
        equivalence
    );
}

/// Whether the initial states of `l1` and `l2` are equivalent. Works on
/// copies of the two systems.
pub fn bisimulation_compare(l1: &Lts, l2: &Lts, equivalence: Equivalence) -> bool {
    destructive_bisimulation_compare(&mut l1.clone(), l2, equivalence)
}

/// Like [`bisimulation_compare`], but `l1` is overwritten with the merged and
/// preprocessed system to save a copy.
pub fn destructive_bisimulation_compare(l1: &mut Lts, l2: &Lts, equivalence: Equivalence) -> bool {
    let init1 = l1.initial_state();
    let init2 = l1.merge(l2);
    let (init1, init2) = if equivalence.branching() {
        let component = scc::scc_reduce(l1, equivalence.preserve_divergence());
        (component[init1], component[init2])
    } else {
        (init1, init2)
    };
    let partitioner = Partitioner::new(l1, equivalence.branching(), equivalence.preserve_divergence());
    let equal = partitioner.in_same_class(init1, init2);
    debug!("initial states {} and {} equivalent: {}", init1, init2, equal);
    equal
}

/// Whether states `s` and `t` of `lts` are equivalent.
pub fn equivalent_states(lts: &Lts, s: StateIndex, t: StateIndex, equivalence: Equivalence) -> bool {
    let classes = bisimulation_partition(lts, equivalence);
    classes[s] == classes[t]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::random::random_lts_with_rng;

    /// Whether two class assignments describe the same partition.
    fn same_partition(a: &[usize], b: &[usize]) -> bool {
        (0..a.len()).all(|s| (0..a.len()).all(|t| (a[s] == a[t]) == (b[s] == b[t])))
    }

    #[test]
    fn parse_equivalence_names() {
        for e in Equivalence::ALL {
            assert_eq!(e.name().parse::<Equivalence>(), Ok(e));
        }
        assert!("weak-bisim".parse::<Equivalence>().is_err());
    }

    #[test]
    fn reduce_merges_equivalent_states() {
        // 0 -a-> 1 and 0 -a-> 2, where 1 and 2 are deadlocks
        let mut lts = Lts::from_edges(3, [(0, "a", 1), (0, "a", 2)]).unwrap();
        bisimulation_reduce(&mut lts, Equivalence::Strong);
        assert_eq!(lts.num_states(), 2);
        assert_eq!(lts.num_transitions(), 1);
    }

    #[test]
    fn compare_equivalent_systems() {
        let l1 = Lts::from_edges(2, [(0, "a", 1)]).unwrap();
        let l2 = Lts::from_edges(3, [(0, "a", 1), (0, "a", 2)]).unwrap();
        for e in Equivalence::ALL {
            assert!(bisimulation_compare(&l1, &l2, e));
        }
    }

    #[test]
    fn tau_step_distinguishes_only_strongly() {
        // 0 -a-> 1 versus 0 -tau-> 1 -a-> 2
        let l1 = Lts::from_edges(2, [(0, "a", 1)]).unwrap();
        let l2 = Lts::from_edges(3, [(0, "tau", 1), (1, "a", 2)]).unwrap();
        assert!(!bisimulation_compare(&l1, &l2, Equivalence::Strong));
        assert!(bisimulation_compare(&l1, &l2, Equivalence::Branching));
        assert!(bisimulation_compare(&l1, &l2, Equivalence::DivergencePreservingBranching));
    }

    #[test]
    fn divergence_is_detected_through_tau_cycles() {
        // 0 -tau-> 1 -tau-> 0 and 1 -a-> 2, versus 3 -a-> 2
        let lts = Lts::from_edges(4, [(0, "tau", 1), (1, "tau", 0), (1, "a", 2), (3, "a", 2)]).unwrap();
        assert!(equivalent_states(&lts, 0, 3, Equivalence::Branching));
        assert!(!equivalent_states(&lts, 0, 3, Equivalence::DivergencePreservingBranching));
        assert!(equivalent_states(&lts, 0, 1, Equivalence::DivergencePreservingBranching));
    }

    #[test]
    fn reducing_twice_changes_nothing() {
        let mut rng = fastrand::Rng::with_seed(7);
        for e in Equivalence::ALL {
            for _ in 0..20 {
                let mut lts = random_lts_with_rng(&mut rng, 10, 3, 3);
                bisimulation_reduce(&mut lts, e);
                let once = lts.clone();
                let classes = bisimulation_partition(&once, e);
                assert_eq!(classes.iter().max().map_or(0, |m| m + 1), once.num_states());
                bisimulation_reduce(&mut lts, e);
                assert_eq!(lts.num_states(), once.num_states());
                assert_eq!(lts.num_transitions(), once.num_transitions());
            }
        }
    }

    #[test]
    fn state_offering_the_same_step_joins_the_tau_loop() {
        // 0 -a-> 1 -tau-> 2 -a-> 1: state 0 and state 2 offer exactly `a` to 1
        let lts = Lts::from_edges(3, [(0, "a", 1), (1, "tau", 2), (2, "a", 1)]).unwrap();
        assert_eq!(bisimulation_partition(&lts, Equivalence::Branching), vec![0, 0, 0]);
        let strong = bisimulation_partition(&lts, Equivalence::Strong);
        assert_eq!(strong[0], strong[2]);
        assert_ne!(strong[0], strong[1]);
    }

    #[test]
    fn separate_a_loops_are_equivalent() {
        let l1 = Lts::from_edges(1, [(0, "a", 0)]).unwrap();
        for e in Equivalence::ALL {
            assert!(destructive_bisimulation_compare(&mut l1.clone(), &l1, e));
        }
    }

    #[test]
    fn tau_fork_collapses_only_when_branching() {
        // 0 -tau-> 1, 0 -tau-> 2, 1 -a-> 3, 2 -a-> 3
        let lts = Lts::from_edges(4, [(0, "tau", 1), (0, "tau", 2), (1, "a", 3), (2, "a", 3)]).unwrap();
        let count = |e| bisimulation_partition(&lts, e).into_iter().max().map_or(0, |m| m + 1);
        assert_eq!(count(Equivalence::Strong), 3);
        assert_eq!(count(Equivalence::Branching), 2);
        assert!(equivalent_states(&lts, 1, 2, Equivalence::Strong));
        assert!(equivalent_states(&lts, 0, 1, Equivalence::Branching));
        assert!(!equivalent_states(&lts, 0, 1, Equivalence::Strong));
    }

    #[test]
    fn agrees_with_naive_refinement() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for e in Equivalence::ALL {
            for round in 0..300 {
                let n = rng.usize(1..=12);
                let num_labels = rng.usize(1..=3);
                let lts = random_lts_with_rng(&mut rng, n, num_labels, 3);
                let fast = bisimulation_partition(&lts, e);
                let slow = naive::partition(&lts, e);
                assert!(
                    same_partition(&fast, &slow),
                    "round {round}, {e}: partitioner {fast:?} but naive {slow:?} on\n{lts}"
                );
            }
        }
    }

    #[test]
    fn finer_equivalences_have_more_classes() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..100 {
            let n = rng.usize(1..=15);
            let lts = random_lts_with_rng(&mut rng, n, 3, 3);
            let count = |e| bisimulation_partition(&lts, e).into_iter().max().map_or(0, |m| m + 1);
            let strong = count(Equivalence::Strong);
            let dpbranching = count(Equivalence::DivergencePreservingBranching);
            let branching = count(Equivalence::Branching);
            assert!(strong >= dpbranching, "{lts}");
            assert!(dpbranching >= branching, "{lts}");
        }
    }
}
