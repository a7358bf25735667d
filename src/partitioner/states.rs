//! States, their permutation and the blocks of the partition.
//!
//! Every block owns a contiguous range of the permutation array. Within that
//! range the states are ordered as
//!
//! ```text
//! [begin, marked_bottom_begin)                 unmarked bottom states
//! [marked_bottom_begin, nonbottom_begin)       marked bottom states
//! [nonbottom_begin, marked_nonbottom_begin)    unmarked non-bottom states
//! [marked_nonbottom_begin, end)                marked non-bottom states
//! ```
//!
//! Marking a state is nothing more than swapping it across one of these
//! boundaries, which keeps marking and unmarking O(1).

use tracing::trace;

use super::{BlockIdx, SliceIdx};
use crate::lts::StateIndex;

/// Per-state bookkeeping of the partitioner.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateInfo {
    /// Position of the state in the permutation array.
    pub pos: usize,
    pub block: BlockIdx,
    pub pred_begin: usize,
    /// Incoming transitions at or after this position are inert.
    pub pred_inert_begin: usize,
    pub pred_end: usize,
    pub succ_begin: usize,
    /// Outgoing transitions at or after this position are inert.
    pub succ_inert_begin: usize,
    pub succ_end: usize,
    /// Position in the successor view used by the surely-tests and by
    /// postprocessing. Always lies in `[succ_begin, succ_inert_begin]`.
    pub current_out_slice: usize,
    /// Number of inert successors not yet known to be blue, valid only while
    /// the state is in the initialised region of a blue search.
    pub notblue: usize,
}

impl StateInfo {
    pub fn is_bottom(&self) -> bool {
        self.succ_inert_begin == self.succ_end
    }
}

/// An intrusive doubly linked list over block-bunch slices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SliceList {
    pub first: Option<SliceIdx>,
    pub last: Option<SliceIdx>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Block {
    pub begin: usize,
    pub marked_bottom_begin: usize,
    pub nonbottom_begin: usize,
    pub marked_nonbottom_begin: usize,
    pub end: usize,
    /// Assigned at creation, never changes. Used as equivalence class number.
    pub seqnr: usize,
    /// Block-bunch slices of this block that are known to be stable.
    pub stable: SliceList,
}

impl Block {
    fn new(begin: usize, nonbottom_begin: usize, end: usize, seqnr: usize) -> Self {
        let block = Self {
            begin,
            marked_bottom_begin: nonbottom_begin,
            nonbottom_begin,
            marked_nonbottom_begin: end,
            end,
            seqnr,
            stable: SliceList::default(),
        };
        debug_assert!(block.is_well_formed());
        block
    }

    pub fn size(&self) -> usize {
        self.end - self.begin
    }

    pub fn unmarked_bottom_size(&self) -> usize {
        self.marked_bottom_begin - self.begin
    }

    pub fn marked_bottom_size(&self) -> usize {
        self.nonbottom_begin - self.marked_bottom_begin
    }

    pub fn unmarked_nonbottom_size(&self) -> usize {
        self.marked_nonbottom_begin - self.nonbottom_begin
    }

    pub fn marked_size(&self) -> usize {
        self.marked_bottom_size() + (self.end - self.marked_nonbottom_begin)
    }

    pub fn clear_marks(&mut self) {
        self.marked_bottom_begin = self.nonbottom_begin;
        self.marked_nonbottom_begin = self.end;
    }

    pub fn is_well_formed(&self) -> bool {
        self.begin <= self.marked_bottom_begin
            && self.marked_bottom_begin <= self.nonbottom_begin
            && self.nonbottom_begin <= self.marked_nonbottom_begin
            && self.marked_nonbottom_begin <= self.end
            && self.begin < self.end
    }
}

/// Decides which of the two halves of a split block gets a new block index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NewBlockMode {
    /// The unmarked (blue) states move to a new block.
    NewIsBlue,
    /// The marked (red) states move to a new block.
    NewIsRed,
}

/// The states, the permutation array and the blocks partitioning it.
#[derive(Debug, Clone, Default)]
pub(crate) struct StatePartition {
    pub states: Vec<StateInfo>,
    pub permutation: Vec<StateIndex>,
    pub blocks: Vec<Block>,
}

impl StatePartition {
    /// Creates the initial block, which contains all states. `permutation`
    /// must list the bottom states first; `num_bottom` of them.
    pub fn new(mut states: Vec<StateInfo>, permutation: Vec<StateIndex>, num_bottom: usize) -> Self {
        assert!(!permutation.is_empty(), "a partition needs at least one state");
        for (pos, &s) in permutation.iter().enumerate() {
            states[s].pos = pos;
            states[s].block = 0;
        }
        let blocks = vec![Block::new(0, num_bottom, permutation.len(), 0)];
        Self {
            states,
            permutation,
            blocks,
        }
    }

    pub fn block_of(&self, s: StateIndex) -> BlockIdx {
        self.states[s].block
    }

    /// Swaps the states at positions `a` and `b` of the permutation.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.permutation.swap(a, b);
        let (sa, sb) = (self.permutation[a], self.permutation[b]);
        self.states[sa].pos = a;
        self.states[sb].pos = b;
    }

    /// Marks `s`. Returns true if it was not marked before.
    pub fn mark(&mut self, s: StateIndex) -> bool {
        let pos = self.states[s].pos;
        let block = &mut self.blocks[self.states[s].block];
        if pos < block.nonbottom_begin {
            if pos < block.marked_bottom_begin {
                block.marked_bottom_begin -= 1;
                let target = block.marked_bottom_begin;
                self.swap(pos, target);
                return true;
            }
            return false;
        }
        self.mark_nonbottom(s)
    }

    /// Marks the non-bottom state `s`. Returns true if it was not marked before.
    pub fn mark_nonbottom(&mut self, s: StateIndex) -> bool {
        let pos = self.states[s].pos;
        let block = &mut self.blocks[self.states[s].block];
        debug_assert!(pos >= block.nonbottom_begin, "state {s} is a bottom state");
        if pos < block.marked_nonbottom_begin {
            block.marked_nonbottom_begin -= 1;
            let target = block.marked_nonbottom_begin;
            self.swap(pos, target);
            return true;
        }
        false
    }

    /// Moves the non-bottom state `s`, which just lost its last inert
    /// transition, into the marked bottom states of its block.
    pub fn make_bottom(&mut self, s: StateIndex) {
        let b = self.states[s].block;
        let pos = self.states[s].pos;
        debug_assert!(pos >= self.blocks[b].nonbottom_begin);
        if pos >= self.blocks[b].marked_nonbottom_begin {
            let target = self.blocks[b].marked_nonbottom_begin;
            self.swap(pos, target);
            self.blocks[b].marked_nonbottom_begin += 1;
        }
        let target = self.blocks[b].nonbottom_begin;
        self.swap(self.states[s].pos, target);
        self.blocks[b].nonbottom_begin += 1;
        debug_assert!(self.blocks[b].is_well_formed());
    }

    pub fn clear_marks(&mut self, b: BlockIdx) {
        self.blocks[b].clear_marks();
    }

    /// Splits `b` into its unmarked and its marked states. One half keeps the
    /// index `b`, the other half becomes a new block whose index is returned.
    /// Afterwards no state in either block is marked.
    pub fn split_off_block(&mut self, b: BlockIdx, mode: NewBlockMode) -> BlockIdx {
        let old = self.blocks[b];
        debug_assert!(old.is_well_formed());
        assert!(
            old.marked_size() > 0 && old.marked_size() < old.size(),
            "splitting block {b} would create an empty block"
        );

        // Exchange the marked bottom states with the unmarked non-bottom
        // states, so that all unmarked states precede all marked ones.
        let swapcount = old.marked_bottom_size().min(old.unmarked_nonbottom_size());
        for i in 0..swapcount {
            self.swap(old.marked_bottom_begin + i, old.marked_nonbottom_begin - 1 - i);
        }
        let splitpoint = old.marked_bottom_begin + old.unmarked_nonbottom_size();

        let seqnr = self.blocks.len();
        let (new_block, kept) = match mode {
            NewBlockMode::NewIsBlue => (
                Block::new(old.begin, old.marked_bottom_begin, splitpoint, seqnr),
                Block {
                    begin: splitpoint,
                    nonbottom_begin: old.marked_nonbottom_begin,
                    ..old
                },
            ),
            NewBlockMode::NewIsRed => (
                Block::new(splitpoint, old.marked_nonbottom_begin, old.end, seqnr),
                Block {
                    end: splitpoint,
                    nonbottom_begin: old.marked_bottom_begin,
                    ..old
                },
            ),
        };
        let new_idx = self.blocks.len();
        for pos in new_block.begin..new_block.end {
            let s = self.permutation[pos];
            self.states[s].block = new_idx;
        }
        trace!(
            "split block {} into [{}, {}) and new block {} = [{}, {})",
            b,
            kept.begin,
            kept.end,
            new_idx,
            new_block.begin,
            new_block.end
        );
        self.blocks[b] = kept;
        self.blocks[b].clear_marks();
        debug_assert!(self.blocks[b].is_well_formed());
        self.blocks.push(new_block);
        new_idx
    }

    /// The states of block `b` in permutation order.
    pub fn block_states(&self, b: BlockIdx) -> &[StateIndex] {
        let block = &self.blocks[b];
        &self.permutation[block.begin..block.end]
    }

    /// The bottom states of block `b` in permutation order.
    pub fn bottom_states(&self, b: BlockIdx) -> &[StateIndex] {
        let block = &self.blocks[b];
        &self.permutation[block.begin..block.nonbottom_begin]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Four states, 0 and 1 bottom, 2 and 3 non-bottom.
    fn partition() -> StatePartition {
        StatePartition::new(vec![StateInfo::default(); 4], vec![0, 1, 2, 3], 2)
    }

    #[test]
    fn marking_moves_states_behind_the_boundaries() {
        let mut p = partition();
        assert!(p.mark(0));
        assert!(!p.mark(0));
        assert!(p.mark(2));
        let block = &p.blocks[0];
        assert_eq!(block.marked_size(), 2);
        assert_eq!(block.unmarked_bottom_size(), 1);
        assert_eq!(block.unmarked_nonbottom_size(), 1);
        assert_eq!(p.states[0].pos, 1);
        assert_eq!(p.states[2].pos, 3);
        for (pos, &s) in p.permutation.iter().enumerate() {
            assert_eq!(p.states[s].pos, pos);
        }
    }

    #[test]
    fn split_new_is_blue() {
        let mut p = partition();
        p.mark(1);
        p.mark(3);
        let blue = p.split_off_block(0, NewBlockMode::NewIsBlue);
        assert_eq!(blue, 1);
        let mut blue_states = p.block_states(blue).to_vec();
        blue_states.sort();
        assert_eq!(blue_states, vec![0, 2]);
        let mut red_states = p.block_states(0).to_vec();
        red_states.sort();
        assert_eq!(red_states, vec![1, 3]);
        assert_eq!(p.bottom_states(blue), &[0]);
        assert_eq!(p.bottom_states(0), &[1]);
        assert_eq!(p.blocks[0].marked_size(), 0);
        assert_eq!(p.blocks[blue].marked_size(), 0);
        assert_eq!(p.block_of(2), blue);
        assert_eq!(p.block_of(3), 0);
    }

    #[test]
    fn split_new_is_red() {
        let mut p = partition();
        p.mark(0);
        p.mark(1);
        let red = p.split_off_block(0, NewBlockMode::NewIsRed);
        let mut red_states = p.block_states(red).to_vec();
        red_states.sort();
        assert_eq!(red_states, vec![0, 1]);
        assert_eq!(p.bottom_states(red).len(), 2);
        assert_eq!(p.bottom_states(0).len(), 0);
        assert_eq!(p.blocks[0].seqnr, 0);
        assert_eq!(p.blocks[red].seqnr, 1);
    }

    #[test]
    fn make_bottom_marks_the_state() {
        let mut p = partition();
        p.mark(3);
        p.make_bottom(3);
        let block = &p.blocks[0];
        assert_eq!(block.nonbottom_begin - block.begin, 3);
        assert_eq!(block.marked_bottom_size(), 1);
        assert_eq!(block.marked_size(), 1);
        assert!(p.states[3].pos < block.nonbottom_begin);
    }
}
