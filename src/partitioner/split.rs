//! Bookkeeping after a block has been split: moving transitions into the
//! slices of the new block, and turning inert transitions that now cross
//! block boundaries into non-inert ones.

use tracing::trace;

use super::states::NewBlockMode;
use super::transitions::{ActionBlockSlice, OutSlice};
use super::bunches::Bunch;
use super::{BlockIdx, BunchIdx, Partitioner, SliceIdx, TransIdx};
use crate::lts::StateIndex;

impl Partitioner {
    /// Updates the transition views after `new_block` has been split off
    /// `old_block`. Inert transitions between the two blocks become non-inert
    /// and are put into the bunch `new_noninert`, which is created on demand.
    pub(super) fn adapt_transitions_for_new_block(
        &mut self,
        new_block: BlockIdx,
        old_block: BlockIdx,
        mode: NewBlockMode,
        new_noninert: &mut Option<BunchIdx>,
    ) {
        let states: Vec<StateIndex> = self.part.block_states(new_block).to_vec();

        // Outgoing transitions of the new block leave the slices of the old one.
        let mut split_block_bunch = Vec::new();
        for &s in &states {
            let state = &self.part.states[s];
            for pos in state.succ_begin..state.succ_inert_begin {
                let t = self.index.succ[pos];
                self.move_to_new_block_bunch_slice(t, new_block, &mut split_block_bunch);
            }
        }
        // Incoming transitions of the new block get their own action-block slices.
        let mut split_action_block = Vec::new();
        for &s in &states {
            let state = &self.part.states[s];
            for pos in state.pred_begin..state.pred_inert_begin {
                let t = self.index.pred[pos];
                if let Some(old) = self.index.move_to_split_action_block_slice(t) {
                    split_action_block.push(old);
                }
            }
        }
        for old in split_action_block {
            let slice = &mut self.index.action_block_slices[old];
            slice.split = None;
            if slice.begin < slice.end {
                let bunch = slice.bunch;
                self.index.make_nontrivial(bunch);
            }
        }
        for old in split_block_bunch {
            self.index.block_bunch_slices[old].split = None;
            if self.index.block_bunch_slices[old].is_empty() {
                self.unlink(old);
            }
        }

        if self.index.block_bunch_inert_begin == self.index.block_bunch.len() {
            return;
        }
        let mut became_noninert = 0;
        match mode {
            NewBlockMode::NewIsBlue => {
                // inert transitions from the red part into the blue part
                for &s in &states {
                    let mut pos = self.part.states[s].pred_inert_begin;
                    while pos < self.part.states[s].pred_end {
                        let t = self.index.pred[pos];
                        if self.part.block_of(self.index.source(t)) != new_block {
                            self.make_noninert(t, new_noninert);
                            became_noninert += 1;
                        }
                        pos += 1;
                    }
                }
            }
            NewBlockMode::NewIsRed => {
                // inert transitions from the red part into the blue part
                for &s in &states {
                    let mut pos = self.part.states[s].succ_inert_begin;
                    while pos < self.part.states[s].succ_end {
                        let t = self.index.succ[pos];
                        if self.part.block_of(self.index.target(t)) != new_block {
                            self.make_noninert(t, new_noninert);
                            became_noninert += 1;
                        }
                        pos += 1;
                    }
                }
            }
        }
        if became_noninert > 0 {
            trace!(
                "{} transitions between blocks {} and {} became non-inert",
                became_noninert,
                old_block,
                new_block
            );
        }
    }

    /// Moves `t`, whose source has just moved to `new_block`, into the slice
    /// of `new_block` for the same bunch.
    fn move_to_new_block_bunch_slice(&mut self, t: TransIdx, new_block: BlockIdx, split: &mut Vec<SliceIdx>) {
        let old = self.index.block_bunch_slice_of(t);
        let new = match self.index.block_bunch_slices[old].split {
            Some(new) => new,
            None => {
                let slice = &self.index.block_bunch_slices[old];
                let (end, bunch, stable) = (slice.end, slice.bunch, slice.stable);
                let new = self.index.new_block_bunch_slice(end, end, bunch, new_block);
                if stable {
                    self.index.block_bunch_slices[new].stable = true;
                    self.part.blocks[new_block]
                        .stable
                        .push_back(&mut self.index.block_bunch_slices, new);
                } else {
                    self.index
                        .unstable
                        .insert_after(&mut self.index.block_bunch_slices, old, new);
                }
                self.index.block_bunch_slices[old].split = Some(new);
                split.push(old);
                new
            }
        };
        self.index.move_to_block_bunch_slice(t, new);
    }

    /// Turns the inert transition `t` into a non-inert one in bunch
    /// `new_noninert`, which is created if it is `None`. Returns true if the
    /// source of `t` has become a bottom state.
    pub(super) fn make_noninert(&mut self, t: TransIdx, new_noninert: &mut Option<BunchIdx>) -> bool {
        let (source, target, label) = {
            let tr = &self.index.trans[t];
            (tr.from, tr.to, tr.label)
        };

        let p = self.part.states[target].pred_inert_begin;
        self.index.swap_pred(self.index.info[t].pred_pos, p);
        self.part.states[target].pred_inert_begin += 1;

        let a = self.index.action_block_inert_begin;
        self.index.swap_action_block(self.index.info[t].action_block_pos, a);
        self.index.action_block_inert_begin += 1;

        let q = self.part.states[source].succ_inert_begin;
        self.index.swap_succ(self.index.info[t].succ_pos, q);
        self.part.states[source].succ_inert_begin += 1;

        let r = self.index.block_bunch_inert_begin;
        self.index.swap_block_bunch(self.index.info[t].block_bunch_pos, r);
        self.index.block_bunch_inert_begin += 1;

        let became_bottom = self.part.states[source].is_bottom();
        if became_bottom {
            self.part.make_bottom(source);
        } else {
            self.part.mark_nonbottom(source);
        }

        // action-block slice and bunch
        let target_block = self.part.block_of(target);
        let bunch = match *new_noninert {
            Some(bunch) => {
                debug_assert_eq!(self.index.bunches[bunch].end, a);
                let b = &mut self.index.bunches[bunch];
                b.end = a + 1;
                b.key_end = b.key_end.max(a + 1);
                let prev = self.index.action_block[a - 1];
                let prev_slice = self.index.action_block_slice_of(prev);
                let prev_trans = &self.index.trans[prev];
                if self.index.action_block_slices[prev_slice].bunch == bunch
                    && prev_trans.label == label
                    && self.part.block_of(prev_trans.to) == target_block
                {
                    self.index.action_block_slices[prev_slice].end = a + 1;
                    self.index.info[t].action_block_slice = Some(prev_slice);
                } else {
                    self.push_action_block_slice(t, a, bunch);
                    self.index.make_nontrivial(bunch);
                }
                bunch
            }
            None => {
                let bunch = self.index.bunches.len();
                self.index.bunches.push(Bunch::new(a, a + 1));
                self.push_action_block_slice(t, a, bunch);
                *new_noninert = Some(bunch);
                bunch
            }
        };

        // out-slice
        let prev_out = (q > self.part.states[source].succ_begin)
            .then(|| self.index.succ[q - 1])
            .filter(|&prev| self.index.bunch_of(prev) == bunch);
        match prev_out {
            Some(prev) => {
                let slice = self.index.out_slice_of(prev);
                debug_assert_eq!(self.index.out_slices[slice].end, q);
                self.index.out_slices[slice].end = q + 1;
                self.index.info[t].out_slice = Some(slice);
            }
            None => {
                self.index.out_slices.push(OutSlice {
                    begin: q,
                    end: q + 1,
                    split: None,
                });
                self.index.info[t].out_slice = Some(self.index.out_slices.len() - 1);
            }
        }

        // block-bunch slice
        let source_block = self.part.block_of(source);
        let prev_slice = (r > 0)
            .then(|| self.index.block_bunch_slice_of(self.index.block_bunch[r - 1]))
            .filter(|&prev| {
                let slice = &self.index.block_bunch_slices[prev];
                slice.bunch == bunch && slice.block == source_block
            });
        match prev_slice {
            Some(prev) => {
                self.index.block_bunch_slices[prev].end = r + 1;
                self.index.info[t].block_bunch_slice = Some(prev);
            }
            None => {
                let slice = self.index.new_block_bunch_slice(r, r + 1, bunch, source_block);
                self.index
                    .unstable
                    .push_front(&mut self.index.block_bunch_slices, slice);
                self.index.info[t].block_bunch_slice = Some(slice);
            }
        }
        became_bottom
    }

    fn push_action_block_slice(&mut self, t: TransIdx, pos: usize, bunch: BunchIdx) {
        self.index.action_block_slices.push(ActionBlockSlice {
            begin: pos,
            end: pos + 1,
            bunch,
            split: None,
        });
        self.index.info[t].action_block_slice = Some(self.index.action_block_slices.len() - 1);
    }
}
