//! Reduction of labelled transition systems modulo strong bisimulation,
//! branching bisimulation and divergence-preserving branching bisimulation.
//!
//! The core is the [`partitioner::Partitioner`], which computes the coarsest
//! bisimulation of a transition system in O(m log n) time, where m is the
//! number of transitions and n the number of states. The functions in
//! [`algorithms`] wrap it into complete reductions and comparisons.
#![warn(missing_docs)]

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use lts_bisim::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        algorithms::{
            bisimulation_compare, bisimulation_partition, bisimulation_reduce, destructive_bisimulation_compare,
            scc::scc_reduce, Equivalence,
        },
        aut::{read_aut, read_aut_from, to_aut_string, write_aut, AutError},
        lts::{LabelIndex, Lts, LtsError, StateIndex, Transition, TAU},
        partitioner::Partitioner,
    };
}

/// Labelled transition systems.
pub mod lts;

/// Reading and writing the textual `.aut` format.
pub mod aut;

/// The O(m log n) partition refinement algorithm.
pub mod partitioner;

/// Reductions and comparisons built on top of the partitioner, together with
/// the preprocessing they need.
pub mod algorithms;

/// Generation of random transition systems.
pub mod random;

/// Tabular rendering of transition systems for the terminal.
pub mod table;

/// Hash map used throughout the crate.
#[cfg(feature = "ahash")]
pub type Map<K, V> = ahash::HashMap<K, V>;
/// Hash map used throughout the crate.
#[cfg(not(feature = "ahash"))]
pub type Map<K, V> = std::collections::HashMap<K, V>;

/// Hash set used throughout the crate.
#[cfg(feature = "ahash")]
pub type Set<S> = ahash::HashSet<S>;
/// Hash set used throughout the crate.
#[cfg(not(feature = "ahash"))]
pub type Set<S> = std::collections::HashSet<S>;

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    /// A process that does `a` and then chooses between `b` and `c`, next to
    /// one that chooses right away. States 0 and 4 are the two initial states.
    pub fn early_late_choice() -> Lts {
        Lts::from_edges(
            8,
            [
                (0, "a", 1),
                (1, "b", 2),
                (1, "c", 3),
                (4, "a", 5),
                (4, "a", 6),
                (5, "b", 7),
                (6, "c", 7),
            ],
        )
        .unwrap()
    }

    /// `0 -tau-> 1 -a-> 2` next to `3 -a-> 2`, where the `tau` step is inert.
    pub fn inert_prefix() -> Lts {
        Lts::from_edges(4, [(0, "tau", 1), (1, "a", 2), (3, "a", 2)]).unwrap()
    }

    #[test]
    fn early_choice_is_not_bisimilar_to_late_choice() {
        let lts = early_late_choice();
        let classes = bisimulation_partition(&lts, Equivalence::Strong);
        assert_ne!(classes[0], classes[4]);
        assert_eq!(classes[2], classes[3]);
        assert_eq!(classes[2], classes[7]);
    }

    #[test]
    fn tau_prefix_is_absorbed_by_branching_bisimulation() {
        let lts = inert_prefix();
        let classes = bisimulation_partition(&lts, Equivalence::Branching);
        assert_eq!(classes[0], classes[3]);
        let classes = bisimulation_partition(&lts, Equivalence::Strong);
        assert_ne!(classes[0], classes[3]);
    }
}
