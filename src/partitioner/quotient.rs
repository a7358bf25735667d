//! Reading the result: equivalence classes and the quotient system.

use itertools::Itertools;
use tracing::debug;

use super::Partitioner;
use crate::lts::{Lts, StateIndex, Transition};

impl Partitioner {
    /// Number of equivalence classes, which is the number of blocks.
    pub fn num_eq_classes(&self) -> usize {
        self.part.blocks.len()
    }

    /// The equivalence class of state `s`, a number below
    /// [`Partitioner::num_eq_classes`].
    pub fn get_eq_class(&self, s: StateIndex) -> usize {
        self.part.blocks[self.part.block_of(s)].seqnr
    }

    /// Whether `s` and `t` are equivalent.
    pub fn in_same_class(&self, s: StateIndex, t: StateIndex) -> bool {
        self.part.block_of(s) == self.part.block_of(t)
    }

    /// The equivalence class of every state.
    pub fn classes(&self) -> Vec<usize> {
        (0..self.part.states.len()).map(|s| self.get_eq_class(s)).collect()
    }

    /// The transitions of the quotient system, one per class, label and
    /// target class, sorted.
    pub fn quotient_transitions(&self) -> Vec<Transition> {
        self.part
            .blocks
            .iter()
            .flat_map(|block| {
                block.stable.iter(&self.index.block_bunch_slices).map(move |slice| {
                    let t = self.index.block_bunch[self.index.block_bunch_slices[slice].begin];
                    let tr = &self.index.trans[t];
                    Transition::new(block.seqnr, tr.label, self.get_eq_class(tr.to))
                })
            })
            .sorted()
            .dedup()
            .collect()
    }

    /// Replaces `lts` by its quotient: states become equivalence classes, and
    /// there is one transition per distinct (class, label, class) triple.
    /// Hidden labels appear as `tau`.
    ///
    /// `lts` must be the transition system the partitioner was built from.
    pub fn replace_transition_system(&self, lts: &mut Lts) {
        let transitions = self.quotient_transitions();
        debug!(
            "quotient has {} states and {} transitions",
            self.num_eq_classes(),
            transitions.len()
        );
        lts.set_num_states(self.num_eq_classes());
        lts.set_initial_state(self.get_eq_class(self.initial_state));
        lts.set_transitions(transitions);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn quotient_merges_equivalent_states() {
        // 0 -a-> 1, 0 -a-> 2, 1 -b-> 3, 2 -b-> 3
        let mut lts = Lts::from_edges(4, [(0, "a", 1), (0, "a", 2), (1, "b", 3), (2, "b", 3)]).unwrap();
        let p = Partitioner::new(&lts, false, false);
        assert_eq!(p.num_eq_classes(), 3);
        p.replace_transition_system(&mut lts);
        assert_eq!(lts.num_states(), 3);
        assert_eq!(lts.num_transitions(), 2);
        assert_eq!(lts.initial_state(), p.get_eq_class(0));
        let a = lts.label_index("a").unwrap();
        let b = lts.label_index("b").unwrap();
        let labels: Vec<_> = lts.transitions().iter().map(|t| t.label).sorted().collect();
        assert_eq!(labels, vec![a, b]);
    }

    #[test]
    fn hidden_labels_become_tau() {
        let mut lts = Lts::from_edges(3, [(0, "h", 1), (1, "a", 2)]).unwrap();
        lts.hide_label("h");
        let p = Partitioner::new(&lts, true, false);
        assert_eq!(p.num_eq_classes(), 2);
        let p = Partitioner::new(&lts, false, false);
        p.replace_transition_system(&mut lts);
        assert_eq!(lts.num_states(), 3);
        assert!(lts.transitions().iter().any(|t| t.label == lts.tau_label()));
    }

    #[test]
    fn classes_are_dense() {
        let lts = Lts::from_edges(5, [(0, "a", 1), (1, "b", 2), (3, "a", 4)]).unwrap();
        let p = Partitioner::new(&lts, false, false);
        let classes = p.classes();
        assert!(classes.iter().all(|&c| c < p.num_eq_classes()));
        assert_eq!(classes.iter().unique().count(), p.num_eq_classes());
        assert!(p.in_same_class(2, 4));
        assert!(!p.in_same_class(1, 4));
    }
}
