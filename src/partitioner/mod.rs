//! Partition refinement for strong and (divergence-preserving) branching
//! bisimulation in O(m log n) time.
//!
//! The partitioner keeps two partitions side by side: the states are
//! partitioned into blocks, and the non-inert transitions are partitioned
//! into bunches. A bunch that contains transitions with different labels or
//! into different blocks is *nontrivial*; the main loop repeatedly splits off
//! a small part of a nontrivial bunch and refines every block that is no
//! longer stable under the two resulting bunches. Every transition is moved
//! to a new bunch only O(log n) times, because the part that is split off is
//! always the smaller one.
//!
//! A typical use looks like this:
//!
//! ```
//! use lts_bisim::prelude::*;
//!
//! let lts = Lts::from_edges(3, [(0, "a", 1), (0, "a", 2)]).unwrap();
//! let partitioner = Partitioner::new(&lts, false, false);
//! assert_eq!(partitioner.num_eq_classes(), 2);
//! assert!(partitioner.in_same_class(1, 2));
//! ```

mod bunches;
mod postprocess;
mod quotient;
mod refine;
mod split;
mod stabilize;
mod states;
mod transitions;

use tracing::{debug, trace};

use crate::lts::{Lts, StateIndex, Transition};
use refine::{RefineMode, Refined};
use states::StatePartition;
use transitions::TransitionIndex;

pub(crate) type BlockIdx = usize;
pub(crate) type BunchIdx = usize;
pub(crate) type SliceIdx = usize;
pub(crate) type TransIdx = usize;

/// Computes the coarsest strong or branching bisimulation of an [`Lts`].
///
/// For branching bisimulation the transition system must not contain cycles
/// of `tau` transitions (apart from self-loops), which can be ensured by
/// first applying [`crate::algorithms::scc::scc_reduce`].
#[derive(Debug, Clone)]
pub struct Partitioner {
    part: StatePartition,
    index: TransitionIndex,
    branching: bool,
    preserve_divergence: bool,
    initial_state: StateIndex,
    /// Marks the end of the slices that postprocessing still has to handle.
    postprocess_marker: SliceIdx,
}

impl Partitioner {
    /// Reads the transitions of `lts` and refines the partition until it is
    /// stable. Hidden labels are treated as `tau`.
    ///
    /// # Panics
    ///
    /// If `preserve_divergence` is set without `branching`.
    pub fn new(lts: &Lts, branching: bool, preserve_divergence: bool) -> Self {
        assert!(
            branching || !preserve_divergence,
            "divergence can only be preserved for branching bisimulation"
        );
        let n = lts.num_states();
        let tau = lts.tau_label();
        let trans: Vec<Transition> = lts
            .transitions()
            .iter()
            .map(|t| Transition::new(t.from, lts.apply_hidden_label_map(t.label), t.to))
            .filter(|t| !(branching && !preserve_divergence && t.label == tau && t.from == t.to))
            .collect();
        debug!(
            "partitioning {} states and {} transitions for {} bisimulation",
            n,
            trans.len(),
            match (branching, preserve_divergence) {
                (false, _) => "strong",
                (true, false) => "branching",
                (true, true) => "divergence-preserving branching",
            }
        );

        let (mut index, states) = TransitionIndex::new(n, trans, lts.num_labels(), tau, branching);
        let postprocess_marker = index.new_block_bunch_slice(0, 0, 0, 0);
        let permutation: Vec<StateIndex> = (0..n)
            .filter(|&s| states[s].is_bottom())
            .chain((0..n).filter(|&s| !states[s].is_bottom()))
            .collect();
        let num_bottom = states.iter().filter(|s| s.is_bottom()).count();
        let part = StatePartition::new(states, permutation, num_bottom);

        let mut partitioner = Self {
            part,
            index,
            branching,
            preserve_divergence,
            initial_state: lts.initial_state(),
            postprocess_marker,
        };
        partitioner.create_initial_partition();
        partitioner.refine_partition_until_it_becomes_stable();
        debug!(
            "found {} equivalence classes among {} states",
            partitioner.num_eq_classes(),
            n
        );
        partitioner
    }

    /// Separates the states without non-inert transitions from the others.
    fn create_initial_partition(&mut self) {
        let noninert = self.index.block_bunch_inert_begin;
        if noninert == 0 {
            return;
        }
        let slice = self.index.new_block_bunch_slice(0, noninert, 0, 0);
        for pos in 0..noninert {
            let t = self.index.block_bunch[pos];
            self.index.info[t].block_bunch_slice = Some(slice);
        }
        self.index.block_bunch_slices[slice].stable = true;
        self.part.blocks[0]
            .stable
            .push_back(&mut self.index.block_bunch_slices, slice);

        for s in 0..self.part.states.len() {
            let state = &self.part.states[s];
            if state.succ_begin < state.succ_inert_begin {
                self.part.mark(s);
            }
        }
        if self.part.blocks[0].size() > 1 {
            let Refined { red, .. } = self.refine(0, slice, RefineMode::StateMarkingsForPostprocessing);
            // New bottom states of the red block also have a transition in the
            // single bunch, so the partition is already stable under it.
            self.part.clear_marks(red);
        } else {
            self.part.clear_marks(0);
        }
        trace!("initial partition has {} blocks", self.part.blocks.len());
    }

    /// Whether `tau` steps within a class are treated as inert.
    pub fn branching(&self) -> bool {
        self.branching
    }

    /// Whether `tau` self-loops are kept to distinguish divergent states.
    pub fn preserve_divergence(&self) -> bool {
        self.preserve_divergence
    }

    /// Moves the block-bunch slice `s` from the unstable list into the
    /// stable list of its block.
    fn make_stable(&mut self, s: SliceIdx) {
        debug_assert!(!self.index.block_bunch_slices[s].stable);
        self.index
            .unstable
            .remove(&mut self.index.block_bunch_slices, s);
        let block = self.index.block_bunch_slices[s].block;
        self.index.block_bunch_slices[s].stable = true;
        self.part.blocks[block]
            .stable
            .push_back(&mut self.index.block_bunch_slices, s);
    }

    /// Removes `s` from whichever list it is in.
    fn unlink(&mut self, s: SliceIdx) {
        let slice = &self.index.block_bunch_slices[s];
        let (stable, block) = (slice.stable, slice.block);
        let list = if stable {
            &mut self.part.blocks[block].stable
        } else {
            &mut self.index.unstable
        };
        list.remove(&mut self.index.block_bunch_slices, s);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn classes(p: &Partitioner, n: usize) -> Vec<usize> {
        (0..n).map(|s| p.get_eq_class(s)).collect()
    }

    #[test]
    fn deadlock_is_separated_from_action() {
        let lts = Lts::from_edges(3, [(0, "a", 1), (1, "a", 2)]).unwrap();
        let p = Partitioner::new(&lts, false, false);
        assert_eq!(p.num_eq_classes(), 3);
        let lts = Lts::from_edges(2, [(0, "a", 0), (1, "a", 1)]).unwrap();
        let p = Partitioner::new(&lts, false, false);
        assert_eq!(p.num_eq_classes(), 1);
    }

    #[test]
    fn no_transitions_give_one_class() {
        let lts = Lts::new(5, 0);
        for (branching, divergence) in [(false, false), (true, false), (true, true)] {
            let p = Partitioner::new(&lts, branching, divergence);
            assert_eq!(p.num_eq_classes(), 1);
            assert_eq!(classes(&p, 5), vec![0; 5]);
        }
    }

    #[test]
    fn tau_self_loop_only_matters_for_divergence() {
        let lts = Lts::from_edges(2, [(0, "tau", 0)]).unwrap();
        assert_eq!(Partitioner::new(&lts, true, false).num_eq_classes(), 1);
        assert_eq!(Partitioner::new(&lts, true, true).num_eq_classes(), 2);
        assert_eq!(Partitioner::new(&lts, false, false).num_eq_classes(), 2);
    }

    #[test]
    fn inert_tau_is_absorbed() {
        // 0 -tau-> 1 -a-> 2 and 3 -a-> 2
        let lts = Lts::from_edges(4, [(0, "tau", 1), (1, "a", 2), (3, "a", 2)]).unwrap();
        let p = Partitioner::new(&lts, true, false);
        assert_eq!(p.num_eq_classes(), 2);
        assert!(p.in_same_class(0, 1));
        assert!(p.in_same_class(1, 3));
        assert!(!p.in_same_class(0, 2));
        let p = Partitioner::new(&lts, false, false);
        assert_eq!(p.num_eq_classes(), 3);
        assert!(!p.in_same_class(0, 1));
        assert!(p.in_same_class(1, 3));
    }

    #[test]
    fn non_inert_tau_is_kept() {
        // 0 -tau-> 1 -b-> 2 and 0 -a-> 2: the tau step loses the option a
        let lts = Lts::from_edges(3, [(0, "tau", 1), (1, "b", 2), (0, "a", 2)]).unwrap();
        let p = Partitioner::new(&lts, true, false);
        assert_eq!(p.num_eq_classes(), 3);
    }

    #[test]
    #[should_panic(expected = "divergence can only be preserved")]
    fn divergence_needs_branching() {
        Partitioner::new(&Lts::new(1, 0), false, true);
    }
}
