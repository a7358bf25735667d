//! Restoring stability after inert transitions have become non-inert.
//!
//! When a block is split, some of its states may lose their last inert
//! transition and become bottom states. Bottom states must satisfy every
//! stability requirement of their block, so all blocks containing new bottom
//! states are refined again under every bunch they have transitions in.
//!
//! The bottom states of a block are visited bunch by bunch in the order of
//! their out-slices: `current_out_slice` of each old bottom state points to
//! the first out-slice not yet known to be stable, and the bottom states are
//! kept sorted by the bunch of that out-slice (exhausted states first).

use tracing::trace;

use super::refine::{RefineMode, Refined};
use super::{BlockIdx, Partitioner, SliceIdx};
use crate::lts::StateIndex;

impl Partitioner {
    /// Stabilises the red block `block` of the refinement under
    /// `last_splitter`, which contains new bottom states (they are marked).
    /// Returns the block with the old bottom states of `block` if it was
    /// split off the new bottom states.
    pub(super) fn postprocess_new_noninert(&mut self, block: BlockIdx, last_splitter: SliceIdx) -> Option<BlockIdx> {
        let marker = self.postprocess_marker;
        self.index
            .unstable
            .push_front(&mut self.index.block_bunch_slices, marker);

        let result = self.prepare_for_postprocessing(block, last_splitter);

        while let Some(front) = self.index.unstable.first.filter(|&s| s != marker) {
            let b = self.index.block_bunch_slices[front].block;
            let bunch_key = self.index.bunches[self.index.block_bunch_slices[front].bunch].sort_key;
            let last_bottom = self.part.permutation[self.part.blocks[b].nonbottom_begin - 1];
            let min_key = self.current_out_slice_key(last_bottom);

            if bunch_key < min_key {
                // No bottom state of `b` has a transition in this bunch.
                self.make_stable(front);
                let Refined { red, .. } = self.refine(b, front, RefineMode::BottomStateMarkingsAndFromRed);
                if self.part.blocks[red].marked_size() > 0 {
                    self.prepare_for_postprocessing(red, front);
                }
                continue;
            }

            let cos = self.part.states[last_bottom].current_out_slice;
            let splitter = self.index.block_bunch_slice_of(self.index.succ[cos]);
            let advance = if self.index.block_bunch_slices[splitter].stable {
                b
            } else {
                let bottom = self.part.bottom_states(b);
                let unmarked = bottom.partition_point(|&s| self.current_out_slice_key(s) > min_key);
                let block = &mut self.part.blocks[b];
                block.marked_bottom_begin = block.begin + unmarked;
                self.make_stable(splitter);
                let Refined { red, .. } = self.refine(b, splitter, RefineMode::BottomStateMarkingsAndFromRed);
                if self.part.blocks[red].marked_size() > 0 {
                    match self.prepare_for_postprocessing(red, splitter) {
                        Some(old_bottom) => old_bottom,
                        None => continue,
                    }
                } else {
                    red
                }
            };
            self.advance_current_out_slices(advance, min_key);
        }

        self.index
            .unstable
            .remove(&mut self.index.block_bunch_slices, marker);
        result
    }

    /// Separates the new bottom states of `block`, which are marked, from its
    /// old bottom states. The part with new bottom states has its stable
    /// slices moved to the region that postprocessing still has to check.
    /// Returns the part with old bottom states, if any.
    fn prepare_for_postprocessing(&mut self, block: BlockIdx, last_splitter: SliceIdx) -> Option<BlockIdx> {
        let new_noninert = self.last_noninert_slice();
        let (block, old_bottom) = if self.part.blocks[block].unmarked_bottom_size() > 0 {
            let Refined { red, blue } = self.refine(block, new_noninert, RefineMode::StateMarkingsForPostprocessing);
            (red, blue)
        } else {
            (block, None)
        };
        self.part.clear_marks(block);

        // The transitions that became non-inert last belong to `block`.
        let new_noninert = self.last_noninert_slice();
        debug_assert_eq!(self.index.block_bunch_slices[new_noninert].block, block);
        if !self.index.block_bunch_slices[new_noninert].stable {
            self.make_stable(new_noninert);
        }

        // If no block was split off, all bottom states of `block` are new and
        // each of them has a transition in `last_splitter`.
        let last = &self.index.block_bunch_slices[last_splitter];
        let keep_last = old_bottom.is_none() && last.stable && last.block == block && !last.is_empty();
        let recheck: Vec<SliceIdx> = self.part.blocks[block]
            .stable
            .iter(&self.index.block_bunch_slices)
            .filter(|&s| s != new_noninert && !(keep_last && s == last_splitter))
            .collect();
        let marker = self.postprocess_marker;
        for &s in &recheck {
            self.part.blocks[block]
                .stable
                .remove(&mut self.index.block_bunch_slices, s);
            self.index.block_bunch_slices[s].stable = false;
            self.index
                .unstable
                .insert_before(&mut self.index.block_bunch_slices, marker, s);
        }
        trace!(
            "block {} has new bottom states; {} slices to check again",
            block,
            recheck.len()
        );

        let bottom: Vec<StateIndex> = self.part.bottom_states(block).to_vec();
        for &s in &bottom {
            self.part.states[s].current_out_slice = self.part.states[s].succ_begin;
        }
        self.sort_bottom_states(block);
        old_bottom
    }

    /// The block-bunch slice containing the transition that became non-inert
    /// most recently.
    fn last_noninert_slice(&self) -> SliceIdx {
        let pos = self.index.block_bunch_inert_begin - 1;
        self.index.block_bunch_slice_of(self.index.block_bunch[pos])
    }

    /// Sort key of the bunch `current_out_slice` of `s` points into, or
    /// `usize::MAX` if `s` has no further out-slices.
    fn current_out_slice_key(&self, s: StateIndex) -> usize {
        let state = &self.part.states[s];
        if state.current_out_slice < state.succ_inert_begin {
            self.index.bunch_key_at_succ(state.current_out_slice)
        } else {
            usize::MAX
        }
    }

    /// Moves `current_out_slice` of the bottom states of `block` that point
    /// into the bunch with sort key `key` past that out-slice, then restores
    /// the order of the bottom states.
    fn advance_current_out_slices(&mut self, block: BlockIdx, key: usize) {
        let bottom: Vec<StateIndex> = self.part.bottom_states(block).to_vec();
        for &s in &bottom {
            let cos = self.part.states[s].current_out_slice;
            if self.current_out_slice_key(s) == key {
                let slice = self.index.out_slice_of(self.index.succ[cos]);
                self.part.states[s].current_out_slice = self.index.out_slices[slice].end;
            }
        }
        self.sort_bottom_states(block);
    }

    /// Sorts the bottom states of `block` by descending out-slice key.
    fn sort_bottom_states(&mut self, block: BlockIdx) {
        let begin = self.part.blocks[block].begin;
        let mut keyed: Vec<(usize, StateIndex)> = self
            .part
            .bottom_states(block)
            .iter()
            .map(|&s| (self.current_out_slice_key(s), s))
            .collect();
        keyed.sort_unstable_by(|a, b| b.cmp(a));
        for (i, (_, s)) in keyed.into_iter().enumerate() {
            self.part.permutation[begin + i] = s;
            self.part.states[s].pos = begin + i;
        }
    }
}
