//! The main loop: split a nontrivial bunch and restore stability.

use tracing::{debug, trace};

use super::refine::{RefineMode, Refined};
use super::{BlockIdx, BunchIdx, Partitioner};

impl Partitioner {
    /// Repeats refinement steps until every bunch is trivial, at which point
    /// the partition is the coarsest bisimulation.
    pub(super) fn refine_partition_until_it_becomes_stable(&mut self) {
        let mut rounds = 0usize;
        while let Some(splitter_bunch) = self.index.some_nontrivial() {
            rounds += 1;
            let new_bunch = self.index.split_off_small_action_block_slice(splitter_bunch);
            self.move_transitions_to_new_bunch(new_bunch);
            self.stabilize(splitter_bunch);
        }
        debug!("partition stable after {} refinement rounds", rounds);
    }

    /// Moves the transitions of `new_bunch` out of the out-slices and
    /// block-bunch slices of the bunch they were split off from. Marks their
    /// sources and puts every affected block-bunch slice on the unstable list.
    fn move_transitions_to_new_bunch(&mut self, new_bunch: BunchIdx) {
        let (begin, end) = (self.index.bunches[new_bunch].begin, self.index.bunches[new_bunch].end);
        let mut split_out = Vec::new();
        let mut split_block_bunch = Vec::new();
        for pos in begin..end {
            let t = self.index.action_block[pos];
            let source = self.index.source(t);
            self.part.mark(source);
            if let Some(old) = self.index.move_to_split_out_slice(t) {
                split_out.push(old);
            }

            let old = self.index.block_bunch_slice_of(t);
            let new = match self.index.block_bunch_slices[old].split {
                Some(new) => new,
                None => {
                    debug_assert!(self.index.block_bunch_slices[old].stable);
                    let (slice_end, block) = (
                        self.index.block_bunch_slices[old].end,
                        self.index.block_bunch_slices[old].block,
                    );
                    let new = self.index.new_block_bunch_slice(slice_end, slice_end, new_bunch, block);
                    self.index.block_bunch_slices[old].split = Some(new);
                    split_block_bunch.push(old);
                    new
                }
            };
            self.index.move_to_block_bunch_slice(t, new);
        }

        for old in split_out {
            if let Some(new) = self.index.out_slices[old].split.take() {
                let begin = self.index.out_slices[new].begin;
                let source = self.index.source(self.index.succ[begin]);
                self.part.states[source].current_out_slice = begin;
            }
        }

        for old in split_block_bunch {
            let Some(new) = self.index.block_bunch_slices[old].split.take() else {
                continue;
            };
            let block = self.index.block_bunch_slices[old].block;
            let old_is_empty = self.index.block_bunch_slices[old].is_empty();
            if old_is_empty || self.part.blocks[block].size() <= 1 {
                // Every bottom state of the block still has a transition in
                // one of the two bunches, so the block stays stable.
                if old_is_empty {
                    self.unlink(old);
                }
                self.index.block_bunch_slices[new].stable = true;
                self.part.blocks[block]
                    .stable
                    .push_back(&mut self.index.block_bunch_slices, new);
                self.part.clear_marks(block);
            } else {
                self.unlink(old);
                self.index.block_bunch_slices[old].stable = false;
                self.index
                    .unstable
                    .push_front(&mut self.index.block_bunch_slices, old);
                self.index
                    .unstable
                    .push_front(&mut self.index.block_bunch_slices, new);
            }
        }
        trace!(
            "moved {} transitions to bunch {}",
            end - begin,
            new_bunch
        );
    }

    /// Refines blocks under the unstable block-bunch slices until none is
    /// left. `splitter_bunch` is the bunch the last new bunch was split off.
    fn stabilize(&mut self, splitter_bunch: BunchIdx) {
        while let Some(splitter) = self.index.unstable.first {
            let block = self.index.block_bunch_slices[splitter].block;
            self.make_stable(splitter);
            if self.part.blocks[block].size() <= 1 {
                self.part.clear_marks(block);
                continue;
            }
            let mode = if self.part.blocks[block].marked_size() > 0 {
                RefineMode::StateMarkings
            } else {
                RefineMode::FromRedOnly
            };
            let Refined { red, blue } = self.refine(block, splitter, mode);
            if self.part.blocks[red].marked_size() > 0 {
                let unstable_bottom = self.postprocess_new_noninert(red, splitter);
                trace!("postprocessing left block {:?} with old bottom states", unstable_bottom);
            }
            if let (RefineMode::StateMarkings, Some(blue)) = (mode, blue) {
                self.skip_stable_remainder(blue, splitter_bunch);
            }
        }
    }

    /// After splitting under the new bunch, the blue block has no transition
    /// in it, so all of its bottom states have a transition in the remainder
    /// of the old bunch. Its slice for the old bunch, which is one of the
    /// first two unstable slices, is therefore stable.
    fn skip_stable_remainder(&mut self, blue: BlockIdx, splitter_bunch: BunchIdx) {
        let mut candidate = self.index.unstable.first;
        for _ in 0..2 {
            let Some(slice) = candidate else {
                return;
            };
            let s = &self.index.block_bunch_slices[slice];
            if s.block == blue && s.bunch == splitter_bunch {
                self.make_stable(slice);
                return;
            }
            candidate = s.next;
        }
    }
}
