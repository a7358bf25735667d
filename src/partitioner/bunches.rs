//! Bunches: sets of action-block slices that the partition is stable under as
//! a whole.
//!
//! Each bunch carries a half-open interval of sort keys. Intervals of
//! different bunches never overlap, so comparing `sort_key`s orders bunches
//! consistently with the order of out-slices in the successor view.

use tracing::trace;

use super::transitions::TransitionIndex;
use super::{BunchIdx, SliceIdx};

#[derive(Debug, Clone)]
pub(crate) struct Bunch {
    /// Range of the action-block view covered by the bunch.
    pub begin: usize,
    pub end: usize,
    pub sort_key: usize,
    /// End of the key interval reserved for this bunch and the bunches that
    /// will be split off from it.
    pub key_end: usize,
    pub nontrivial: bool,
}

impl Bunch {
    pub fn new(begin: usize, end: usize) -> Self {
        Self {
            begin,
            end,
            sort_key: begin,
            key_end: end,
            nontrivial: false,
        }
    }

    pub fn size(&self) -> usize {
        self.end - self.begin
    }
}

impl TransitionIndex {
    pub fn make_nontrivial(&mut self, b: BunchIdx) {
        if !self.bunches[b].nontrivial {
            self.bunches[b].nontrivial = true;
            self.nontrivial.push(b);
        }
    }

    /// Some bunch that consists of more than one action-block slice.
    pub fn some_nontrivial(&self) -> Option<BunchIdx> {
        self.nontrivial.last().copied()
    }

    fn action_block_slice_at(&self, pos: usize) -> SliceIdx {
        self.action_block_slice_of(self.action_block[pos])
    }

    /// Removes the smaller of the first and the last action-block slice of the
    /// nontrivial bunch `b` and turns it into a new trivial bunch, whose index
    /// is returned. `b` must be the top of the nontrivial stack.
    pub fn split_off_small_action_block_slice(&mut self, b: BunchIdx) -> BunchIdx {
        let (begin, end) = (self.bunches[b].begin, self.bunches[b].end);
        let first = self.action_block_slice_at(begin);
        let last = self.action_block_slice_at(end - 1);
        assert_ne!(first, last, "bunch {b} consists of a single action-block slice");

        if self.action_block_slices[first].end == self.action_block_slices[last].begin {
            // only two slices left
            let popped = self.nontrivial.pop();
            debug_assert_eq!(popped, Some(b));
            self.bunches[b].nontrivial = false;
        }

        let first_size = self.action_block_slices[first].end - self.action_block_slices[first].begin;
        let last_size = self.action_block_slices[last].end - self.action_block_slices[last].begin;
        let moved = if first_size > last_size { last } else { first };
        let (moved_begin, moved_end) = (
            self.action_block_slices[moved].begin,
            self.action_block_slices[moved].end,
        );
        let bunch = &mut self.bunches[b];
        if moved == first {
            bunch.begin = moved_end;
        } else {
            bunch.end = moved_begin;
        }
        let new_key = bunch.sort_key + bunch.size();
        let new_bunch = Bunch {
            begin: moved_begin,
            end: moved_end,
            sort_key: new_key,
            key_end: bunch.key_end,
            nontrivial: false,
        };
        bunch.key_end = new_key;
        debug_assert!(new_bunch.sort_key + new_bunch.size() <= new_bunch.key_end);

        let new = self.bunches.len();
        self.bunches.push(new_bunch);
        self.action_block_slices[moved].bunch = new;
        trace!(
            "split bunch {} = [{}, {}) off bunch {}",
            new,
            moved_begin,
            moved_end,
            b
        );
        new
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lts::Transition;

    /// Three labels with 1, 3 and 2 transitions respectively.
    fn index() -> TransitionIndex {
        let mut trans = vec![Transition::new(0, 0, 1)];
        trans.extend((0..3).map(|i| Transition::new(i, 1, 0)));
        trans.extend((0..2).map(|i| Transition::new(i, 2, 2)));
        TransitionIndex::new(3, trans, 3, 0, false).0
    }

    #[test]
    fn splits_off_the_smaller_end() {
        let mut index = index();
        assert_eq!(index.some_nontrivial(), Some(0));
        let new = index.split_off_small_action_block_slice(0);
        // first slice (label 0, one transition) is smaller than the last one
        assert_eq!((index.bunches[new].begin, index.bunches[new].end), (0, 1));
        assert_eq!((index.bunches[0].begin, index.bunches[0].end), (1, 6));
        assert!(index.bunches[0].nontrivial);
        assert!(index.bunches[new].sort_key > index.bunches[0].sort_key);
        assert!(index.bunches[new].sort_key >= index.bunches[0].key_end);

        let newer = index.split_off_small_action_block_slice(0);
        assert_eq!((index.bunches[newer].begin, index.bunches[newer].end), (4, 6));
        assert_eq!(index.some_nontrivial(), None);
        assert!(!index.bunches[0].nontrivial);
        let keys = [0, new, newer].map(|b| (index.bunches[b].sort_key, index.bunches[b].key_end));
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert!(a.1 <= b.0 || b.1 <= a.0, "key intervals {a:?} and {b:?} overlap");
            }
        }
    }
}
