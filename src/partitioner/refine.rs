//! Splitting a single block under a splitter.
//!
//! The states of the block are divided into *red* states, which can reach a
//! transition of the splitter through inert transitions, and *blue* states,
//! which cannot. Both halves are searched for at the same time, one step each
//! in turn. As soon as one search has found more than half of the block it is
//! aborted and the other one runs to completion, so the time spent is
//! proportional to the smaller half.

use tracing::trace;

use super::states::NewBlockMode;
use super::{BlockIdx, BunchIdx, Partitioner, SliceIdx};
use crate::lts::StateIndex;

/// Which information about the red states is available when `refine` starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefineMode {
    /// All states with a transition in the splitter are already marked.
    StateMarkings,
    /// Like `StateMarkings`. Transitions that become non-inert are added to
    /// the bunch of the splitter instead of a new bunch.
    StateMarkingsForPostprocessing,
    /// No state is marked; the sources of the splitter are red.
    FromRedOnly,
    /// The bottom states with a transition in the splitter are marked; the
    /// non-bottom ones still have to be found.
    BottomStateMarkingsAndFromRed,
}

impl RefineMode {
    fn has_state_markings(self) -> bool {
        matches!(self, Self::StateMarkings | Self::StateMarkingsForPostprocessing)
    }
}

/// Outcome of a refinement. `blue` is `None` if the block was not split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Refined {
    pub red: BlockIdx,
    pub blue: Option<BlockIdx>,
}

/// Data shared between the red and the blue search.
struct Search {
    block: BlockIdx,
    splitter: SliceIdx,
    bunch: BunchIdx,
    half: usize,
    /// Non-bottom states in `[nonbottom_begin, notblue_initialised_end)` have
    /// a valid `notblue` counter.
    notblue_initialised_end: usize,
    fromred_handled: bool,
    new_noninert: Option<BunchIdx>,
}

enum BlueSearch {
    /// Find the bottom states that have a transition in the splitter.
    CollectBottom { visited_end: usize },
    Start,
    Visit {
        visited_end: usize,
        nonbottom_end: usize,
        pred: usize,
        pred_end: usize,
    },
}

enum RedSearch {
    Start,
    CollectFromRed { next: usize },
    VisitBottom { visited_begin: usize, pred: usize, pred_end: usize },
    VisitNonbottom { visited_begin: usize, pred: usize, pred_end: usize },
}

enum Step {
    Continue,
    /// This search has become too large.
    Abort,
    /// The other search has become too large.
    AbortOther,
    Done(Refined),
}

impl Partitioner {
    /// Splits `block` under the block-bunch slice `splitter`, which must
    /// contain transitions of `block` only.
    ///
    /// # Panics
    ///
    /// In the marking modes, if no state is marked.
    pub(super) fn refine(&mut self, block: BlockIdx, splitter: SliceIdx, mode: RefineMode) -> Refined {
        let b = &self.part.blocks[block];
        let slice = &self.index.block_bunch_slices[splitter];
        debug_assert_eq!(slice.block, block);
        if mode.has_state_markings() {
            assert!(b.marked_size() > 0, "refine needs at least one marked state");
        } else {
            assert!(!slice.is_empty(), "refine needs a nonempty splitter");
        }
        trace!(
            "refining block {} ({} states) under slice {} in mode {:?}",
            block,
            b.size(),
            splitter,
            mode
        );

        let mut search = Search {
            block,
            splitter,
            bunch: slice.bunch,
            half: b.size() / 2,
            notblue_initialised_end: b.nonbottom_begin,
            fromred_handled: mode.has_state_markings(),
            new_noninert: (mode == RefineMode::StateMarkingsForPostprocessing).then_some(slice.bunch),
        };
        let mut blue = match mode {
            RefineMode::FromRedOnly => BlueSearch::CollectBottom { visited_end: b.begin },
            _ => BlueSearch::Start,
        };
        let mut red = RedSearch::Start;
        let (mut blue_running, mut red_running) = (true, true);
        loop {
            if blue_running {
                match self.blue_step(&mut search, &mut blue) {
                    Step::Continue => {}
                    Step::Abort => blue_running = false,
                    Step::AbortOther => red_running = false,
                    Step::Done(refined) => return refined,
                }
            }
            if red_running {
                match self.red_step(&mut search, &mut red) {
                    Step::Continue => {}
                    Step::Abort => red_running = false,
                    Step::AbortOther => blue_running = false,
                    Step::Done(refined) => return refined,
                }
            }
            assert!(blue_running || red_running, "both halves of block {block} are too large");
        }
    }

    fn blue_step(&mut self, search: &mut Search, state: &mut BlueSearch) -> Step {
        let block = self.part.blocks[search.block];
        match state {
            BlueSearch::CollectBottom { visited_end } => {
                if *visited_end >= block.marked_bottom_begin || search.fromred_handled {
                    *state = BlueSearch::Start;
                    return Step::Continue;
                }
                let s = self.part.permutation[*visited_end];
                if self.has_transition_to(s, search.bunch) {
                    self.part.mark(s);
                    if self.part.blocks[search.block].marked_size() > search.half {
                        return Step::AbortOther;
                    }
                } else {
                    *visited_end += 1;
                    if *visited_end - block.begin > search.half {
                        return Step::Abort;
                    }
                }
                Step::Continue
            }
            BlueSearch::Start => {
                let unmarked_bottom = block.unmarked_bottom_size();
                if unmarked_bottom > search.half {
                    return Step::Abort;
                }
                if unmarked_bottom == 0 {
                    // every bottom state is red, hence every state is red
                    self.part.clear_marks(search.block);
                    return Step::Done(Refined {
                        red: search.block,
                        blue: None,
                    });
                }
                *state = BlueSearch::Visit {
                    visited_end: block.begin,
                    nonbottom_end: block.nonbottom_begin,
                    pred: 0,
                    pred_end: 0,
                };
                Step::Continue
            }
            BlueSearch::Visit {
                visited_end,
                nonbottom_end,
                pred,
                pred_end,
            } => {
                if *pred < *pred_end {
                    let source = self.index.source(self.index.pred[*pred]);
                    *pred += 1;
                    if self.visit_blue_predecessor(search, source, *nonbottom_end) {
                        *nonbottom_end += 1;
                        let blue_size = *nonbottom_end - block.nonbottom_begin + block.unmarked_bottom_size();
                        if blue_size > search.half {
                            return Step::Abort;
                        }
                    }
                    return Step::Continue;
                }
                if *visited_end == block.marked_bottom_begin {
                    *visited_end = block.nonbottom_begin;
                }
                if *visited_end < *nonbottom_end {
                    let s = self.part.permutation[*visited_end];
                    *visited_end += 1;
                    *pred = self.part.states[s].pred_inert_begin;
                    *pred_end = self.part.states[s].pred_end;
                    return Step::Continue;
                }
                // Unmarked non-bottom states that are not blue are red.
                self.part.blocks[search.block].marked_nonbottom_begin = *nonbottom_end;
                let blue = self.part.split_off_block(search.block, NewBlockMode::NewIsBlue);
                self.adapt_transitions_for_new_block(blue, search.block, NewBlockMode::NewIsBlue, &mut search.new_noninert);
                Step::Done(Refined {
                    red: search.block,
                    blue: Some(blue),
                })
            }
        }
    }

    /// Handles an inert predecessor `source` of a blue state. Returns true if
    /// `source` turned out to be blue; it is then moved to position
    /// `nonbottom_end`.
    fn visit_blue_predecessor(&mut self, search: &mut Search, source: StateIndex, nonbottom_end: usize) -> bool {
        let block = &self.part.blocks[search.block];
        let pos = self.part.states[source].pos;
        if pos >= block.marked_nonbottom_begin {
            return false;
        }
        if pos >= search.notblue_initialised_end {
            let state = &mut self.part.states[source];
            state.notblue = state.succ_end - state.succ_inert_begin;
            self.part.swap(pos, search.notblue_initialised_end);
            search.notblue_initialised_end += 1;
        }
        let state = &mut self.part.states[source];
        state.notblue -= 1;
        if state.notblue > 0 {
            return false;
        }
        if !search.fromred_handled && self.has_transition_to(source, search.bunch) {
            return false;
        }
        self.part.swap(self.part.states[source].pos, nonbottom_end);
        true
    }

    fn red_step(&mut self, search: &mut Search, state: &mut RedSearch) -> Step {
        let block = self.part.blocks[search.block];
        match state {
            RedSearch::Start => {
                if block.marked_size() > search.half {
                    return Step::Abort;
                }
                *state = if search.fromred_handled {
                    RedSearch::VisitBottom {
                        visited_begin: block.nonbottom_begin,
                        pred: 0,
                        pred_end: 0,
                    }
                } else {
                    RedSearch::CollectFromRed {
                        next: self.index.block_bunch_slices[search.splitter].end,
                    }
                };
                Step::Continue
            }
            RedSearch::CollectFromRed { next } => {
                if *next == self.index.block_bunch_slices[search.splitter].begin {
                    search.fromred_handled = true;
                    *state = RedSearch::VisitBottom {
                        visited_begin: block.nonbottom_begin,
                        pred: 0,
                        pred_end: 0,
                    };
                    return Step::Continue;
                }
                *next -= 1;
                let source = self.index.source(self.index.block_bunch[*next]);
                let pos = self.part.states[source].pos;
                if block.nonbottom_begin <= pos && pos < search.notblue_initialised_end {
                    search.notblue_initialised_end -= 1;
                    self.part.swap(pos, search.notblue_initialised_end);
                }
                if self.part.mark(source) && self.part.blocks[search.block].marked_size() > search.half {
                    return Step::Abort;
                }
                Step::Continue
            }
            RedSearch::VisitBottom {
                visited_begin,
                pred,
                pred_end,
            } => {
                if *pred < *pred_end {
                    let source = self.index.source(self.index.pred[*pred]);
                    *pred += 1;
                    return self.visit_red_predecessor(search, source);
                }
                if *visited_begin > block.marked_bottom_begin {
                    *visited_begin -= 1;
                    let s = self.part.permutation[*visited_begin];
                    *pred = self.part.states[s].pred_inert_begin;
                    *pred_end = self.part.states[s].pred_end;
                } else {
                    *state = RedSearch::VisitNonbottom {
                        visited_begin: block.end,
                        pred: 0,
                        pred_end: 0,
                    };
                }
                Step::Continue
            }
            RedSearch::VisitNonbottom {
                visited_begin,
                pred,
                pred_end,
            } => {
                if *pred < *pred_end {
                    let source = self.index.source(self.index.pred[*pred]);
                    *pred += 1;
                    return self.visit_red_predecessor(search, source);
                }
                if *visited_begin > block.marked_nonbottom_begin {
                    *visited_begin -= 1;
                    let s = self.part.permutation[*visited_begin];
                    *pred = self.part.states[s].pred_inert_begin;
                    *pred_end = self.part.states[s].pred_end;
                    return Step::Continue;
                }
                let red = self.part.split_off_block(search.block, NewBlockMode::NewIsRed);
                self.adapt_transitions_for_new_block(red, search.block, NewBlockMode::NewIsRed, &mut search.new_noninert);
                Step::Done(Refined {
                    red,
                    blue: Some(search.block),
                })
            }
        }
    }

    /// Marks the inert predecessor `source` of a red state as red.
    fn visit_red_predecessor(&mut self, search: &mut Search, source: StateIndex) -> Step {
        let pos = self.part.states[source].pos;
        if pos < search.notblue_initialised_end {
            search.notblue_initialised_end -= 1;
            self.part.swap(pos, search.notblue_initialised_end);
        }
        if self.part.mark_nonbottom(source) && self.part.blocks[search.block].marked_size() > search.half {
            return Step::Abort;
        }
        Step::Continue
    }

    /// True if `s` has a transition in bunch `bunch`, judged from the
    /// out-slice `current_out_slice` points into.
    pub(super) fn surely_has_transition_to(&self, s: StateIndex, bunch: BunchIdx) -> bool {
        let state = &self.part.states[s];
        let pos = state.current_out_slice;
        pos < state.succ_inert_begin && self.index.bunch_of(self.index.succ[pos]) == bunch
    }

    /// True if `s` has no transition in bunch `bunch`, judged from the
    /// out-slices around `current_out_slice`.
    pub(super) fn surely_has_no_transition_to(&self, s: StateIndex, bunch: BunchIdx) -> bool {
        let state = &self.part.states[s];
        let pos = state.current_out_slice;
        let key = self.index.bunches[bunch].sort_key;
        let after = pos == state.succ_inert_begin || self.index.bunch_key_at_succ(pos) > key;
        let before = pos == state.succ_begin || self.index.bunch_key_at_succ(pos - 1) < key;
        after && before
    }

    /// True if `s` has a transition in bunch `bunch`.
    pub(super) fn has_transition_to(&self, s: StateIndex, bunch: BunchIdx) -> bool {
        if self.surely_has_transition_to(s, bunch) {
            return true;
        }
        if self.surely_has_no_transition_to(s, bunch) {
            return false;
        }
        let state = &self.part.states[s];
        let key = self.index.bunches[bunch].sort_key;
        let (mut low, mut high) = (state.succ_begin, state.succ_inert_begin);
        while low < high {
            let mid = low + (high - low) / 2;
            match self.index.bunch_key_at_succ(mid).cmp(&key) {
                std::cmp::Ordering::Equal => return true,
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lts::Lts;

    #[test]
    fn finds_transitions_by_bunch() {
        // state 0 has a, b, c transitions; after splitting, one bunch each
        let lts = Lts::from_edges(4, [(0, "a", 1), (0, "b", 2), (0, "c", 3), (1, "a", 1)]).unwrap();
        let p = Partitioner::new(&lts, false, false);
        let bunches: Vec<_> = (0..3)
            .map(|i| {
                let t = p.index.succ[p.part.states[0].succ_begin + i];
                p.index.bunch_of(t)
            })
            .collect();
        for &b in &bunches {
            assert!(p.has_transition_to(0, b));
        }
        let other = p.index.bunch_of(p.index.succ[p.part.states[1].succ_begin]);
        assert_eq!(p.has_transition_to(1, other), true);
        if !bunches.contains(&other) {
            assert!(!p.has_transition_to(0, other));
        }
        for &b in &bunches {
            if b != other {
                assert!(!p.has_transition_to(1, b));
                assert!(!p.surely_has_transition_to(1, b));
            }
        }
    }

    #[test]
    fn out_slices_are_sorted_by_bunch() {
        let lts = Lts::from_edges(3, [(0, "c", 1), (0, "b", 2), (0, "a", 0), (1, "a", 2), (2, "c", 0)]).unwrap();
        let p = Partitioner::new(&lts, false, false);
        for state in &p.part.states {
            let keys: Vec<_> = (state.succ_begin..state.succ_inert_begin)
                .map(|pos| p.index.bunch_key_at_succ(pos))
                .collect();
            assert!(keys.windows(2).all(|w| w[0] <= w[1]), "unsorted keys {keys:?}");
        }
    }
}
