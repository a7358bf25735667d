//! The four orderings of the transitions and the slices into them.
//!
//! Every transition is stored once and referenced from four views:
//!
//! * `pred`: grouped by target state, inert transitions last per state;
//! * `succ`: grouped by source state, inert transitions last per state, the
//!   non-inert ones sorted by bunch into out-slices;
//! * `action_block`: non-inert transitions grouped by bunch, label and target
//!   block, inert transitions at the end;
//! * `block_bunch`: non-inert transitions grouped by source block and bunch,
//!   inert transitions at the end.
//!
//! Each transition knows its position in every view, so moving a transition
//! within a view is a constant-time swap.

use tracing::trace;

use super::bunches::Bunch;
use super::states::{SliceList, StateInfo};
use super::{BlockIdx, BunchIdx, SliceIdx, TransIdx};
use crate::lts::{StateIndex, Transition};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TransInfo {
    pub pred_pos: usize,
    pub succ_pos: usize,
    pub action_block_pos: usize,
    pub block_bunch_pos: usize,
    pub out_slice: Option<SliceIdx>,
    pub action_block_slice: Option<SliceIdx>,
    pub block_bunch_slice: Option<SliceIdx>,
}

/// Outgoing non-inert transitions of one state into one bunch, as a range of
/// the successor view.
#[derive(Debug, Clone)]
pub(crate) struct OutSlice {
    pub begin: usize,
    pub end: usize,
    pub split: Option<SliceIdx>,
}

/// Transitions of one bunch with the same label into the same block, as a
/// range of the action-block view.
#[derive(Debug, Clone)]
pub(crate) struct ActionBlockSlice {
    pub begin: usize,
    pub end: usize,
    pub bunch: BunchIdx,
    pub split: Option<SliceIdx>,
}

/// Transitions of one bunch leaving one block, as a range of the
/// block-bunch view.
#[derive(Debug, Clone)]
pub(crate) struct BlockBunchSlice {
    pub begin: usize,
    pub end: usize,
    pub bunch: BunchIdx,
    pub block: BlockIdx,
    /// Whether the slice is in the stable list of its block. Otherwise it is
    /// in the global unstable list.
    pub stable: bool,
    pub prev: Option<SliceIdx>,
    pub next: Option<SliceIdx>,
    pub split: Option<SliceIdx>,
}

impl BlockBunchSlice {
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

impl SliceList {
    pub fn push_front(&mut self, slices: &mut [BlockBunchSlice], id: SliceIdx) {
        slices[id].prev = None;
        slices[id].next = self.first;
        match self.first {
            Some(first) => slices[first].prev = Some(id),
            None => self.last = Some(id),
        }
        self.first = Some(id);
    }

    pub fn push_back(&mut self, slices: &mut [BlockBunchSlice], id: SliceIdx) {
        slices[id].next = None;
        slices[id].prev = self.last;
        match self.last {
            Some(last) => slices[last].next = Some(id),
            None => self.first = Some(id),
        }
        self.last = Some(id);
    }

    pub fn insert_after(&mut self, slices: &mut [BlockBunchSlice], after: SliceIdx, id: SliceIdx) {
        let next = slices[after].next;
        slices[id].prev = Some(after);
        slices[id].next = next;
        slices[after].next = Some(id);
        match next {
            Some(next) => slices[next].prev = Some(id),
            None => self.last = Some(id),
        }
    }

    pub fn insert_before(&mut self, slices: &mut [BlockBunchSlice], before: SliceIdx, id: SliceIdx) {
        let prev = slices[before].prev;
        slices[id].next = Some(before);
        slices[id].prev = prev;
        slices[before].prev = Some(id);
        match prev {
            Some(prev) => slices[prev].next = Some(id),
            None => self.first = Some(id),
        }
    }

    pub fn remove(&mut self, slices: &mut [BlockBunchSlice], id: SliceIdx) {
        let (prev, next) = (slices[id].prev, slices[id].next);
        match prev {
            Some(prev) => slices[prev].next = next,
            None => self.first = next,
        }
        match next {
            Some(next) => slices[next].prev = prev,
            None => self.last = prev,
        }
        slices[id].prev = None;
        slices[id].next = None;
    }

    pub fn iter<'a>(&self, slices: &'a [BlockBunchSlice]) -> impl Iterator<Item = SliceIdx> + 'a {
        std::iter::successors(self.first, move |&id| slices[id].next)
    }
}

/// All transitions of the partitioner and the slices over their views.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransitionIndex {
    pub trans: Vec<Transition>,
    pub info: Vec<TransInfo>,
    pub pred: Vec<TransIdx>,
    pub succ: Vec<TransIdx>,
    pub action_block: Vec<TransIdx>,
    pub block_bunch: Vec<TransIdx>,
    pub action_block_inert_begin: usize,
    pub block_bunch_inert_begin: usize,
    pub out_slices: Vec<OutSlice>,
    pub action_block_slices: Vec<ActionBlockSlice>,
    pub block_bunch_slices: Vec<BlockBunchSlice>,
    pub bunches: Vec<Bunch>,
    /// Stack of the bunches that consist of more than one action-block slice.
    pub nontrivial: Vec<BunchIdx>,
    /// Block-bunch slices that still have to be used as splitters.
    pub unstable: SliceList,
}

impl TransitionIndex {
    /// Lays out the four views for the given transitions, which must already
    /// be normalised: hidden labels replaced by `tau` and dropped self-loops
    /// removed. Returns the per-state ranges alongside the index.
    ///
    /// Labels are laid out in ascending order except `tau`, which is placed
    /// last in the action-block view when `branching` holds.
    pub fn new(
        num_states: usize,
        trans: Vec<Transition>,
        num_labels: usize,
        tau: usize,
        branching: bool,
    ) -> (Self, Vec<StateInfo>) {
        let is_inert = |t: &Transition| branching && t.label == tau && t.from != t.to;
        let m = trans.len();
        let mut states = vec![StateInfo::default(); num_states];

        let mut out_noninert = vec![0usize; num_states];
        let mut out_all = vec![0usize; num_states];
        let mut in_noninert = vec![0usize; num_states];
        let mut in_all = vec![0usize; num_states];
        let mut per_label = vec![0usize; num_labels];
        let mut num_inert = 0;
        for t in &trans {
            out_all[t.from] += 1;
            in_all[t.to] += 1;
            if is_inert(t) {
                num_inert += 1;
            } else {
                out_noninert[t.from] += 1;
                in_noninert[t.to] += 1;
                per_label[t.label] += 1;
            }
        }
        let noninert = m - num_inert;

        let (mut succ_pos, mut pred_pos) = (0, 0);
        for (s, info) in states.iter_mut().enumerate() {
            info.succ_begin = succ_pos;
            info.succ_inert_begin = succ_pos + out_noninert[s];
            info.succ_end = succ_pos + out_all[s];
            info.current_out_slice = info.succ_begin;
            succ_pos = info.succ_end;
            info.pred_begin = pred_pos;
            info.pred_inert_begin = pred_pos + in_noninert[s];
            info.pred_end = pred_pos + in_all[s];
            pred_pos = info.pred_end;
        }

        let mut label_order: Vec<usize> = (0..num_labels).filter(|&l| !(branching && l == tau)).collect();
        if branching && tau < num_labels {
            label_order.push(tau);
        }
        let mut label_begin = vec![0usize; num_labels];
        let mut action_pos = 0;
        for &l in &label_order {
            label_begin[l] = action_pos;
            action_pos += per_label[l];
        }

        let mut index = Self {
            info: vec![TransInfo::default(); m],
            pred: vec![0; m],
            succ: vec![0; m],
            action_block: vec![0; m],
            block_bunch: vec![0; m],
            action_block_inert_begin: noninert,
            block_bunch_inert_begin: noninert,
            ..Self::default()
        };
        let mut succ_next: Vec<usize> = states.iter().map(|s| s.succ_begin).collect();
        let mut succ_inert_next: Vec<usize> = states.iter().map(|s| s.succ_inert_begin).collect();
        let mut pred_next: Vec<usize> = states.iter().map(|s| s.pred_begin).collect();
        let mut pred_inert_next: Vec<usize> = states.iter().map(|s| s.pred_inert_begin).collect();
        let mut label_next = label_begin.clone();
        let (mut noninert_next, mut inert_next) = (0, noninert);
        for (id, t) in trans.iter().enumerate() {
            let info = &mut index.info[id];
            let (succ_cursor, pred_cursor) = if is_inert(t) {
                info.action_block_pos = inert_next;
                info.block_bunch_pos = inert_next;
                inert_next += 1;
                (&mut succ_inert_next[t.from], &mut pred_inert_next[t.to])
            } else {
                info.action_block_pos = label_next[t.label];
                label_next[t.label] += 1;
                info.block_bunch_pos = noninert_next;
                noninert_next += 1;
                (&mut succ_next[t.from], &mut pred_next[t.to])
            };
            info.succ_pos = *succ_cursor;
            *succ_cursor += 1;
            info.pred_pos = *pred_cursor;
            *pred_cursor += 1;
            index.succ[info.succ_pos] = id;
            index.pred[info.pred_pos] = id;
            index.action_block[info.action_block_pos] = id;
            index.block_bunch[info.block_bunch_pos] = id;
        }
        index.trans = trans;

        // One out-slice per state, one action-block slice per label.
        for (s, state) in states.iter().enumerate() {
            if out_noninert[s] == 0 {
                continue;
            }
            let id = index.out_slices.len();
            index.out_slices.push(OutSlice {
                begin: state.succ_begin,
                end: state.succ_inert_begin,
                split: None,
            });
            for pos in state.succ_begin..state.succ_inert_begin {
                index.info[index.succ[pos]].out_slice = Some(id);
            }
        }
        index.bunches.push(Bunch::new(0, noninert));
        for &l in &label_order {
            if per_label[l] == 0 {
                continue;
            }
            let id = index.action_block_slices.len();
            let (begin, end) = (label_begin[l], label_begin[l] + per_label[l]);
            index.action_block_slices.push(ActionBlockSlice {
                begin,
                end,
                bunch: 0,
                split: None,
            });
            for pos in begin..end {
                index.info[index.action_block[pos]].action_block_slice = Some(id);
            }
        }
        if index.action_block_slices.len() > 1 {
            index.make_nontrivial(0);
        }
        trace!(
            "laid out {} transitions, {} of them inert, {} action-block slices",
            m,
            num_inert,
            index.action_block_slices.len()
        );
        (index, states)
    }

    pub fn source(&self, t: TransIdx) -> StateIndex {
        self.trans[t].from
    }

    pub fn target(&self, t: TransIdx) -> StateIndex {
        self.trans[t].to
    }

    pub fn action_block_slice_of(&self, t: TransIdx) -> SliceIdx {
        self.info[t]
            .action_block_slice
            .expect("inert transitions have no action-block slice")
    }

    pub fn block_bunch_slice_of(&self, t: TransIdx) -> SliceIdx {
        self.info[t]
            .block_bunch_slice
            .expect("inert transitions have no block-bunch slice")
    }

    pub fn out_slice_of(&self, t: TransIdx) -> SliceIdx {
        self.info[t].out_slice.expect("inert transitions have no out-slice")
    }

    /// The bunch a non-inert transition belongs to.
    pub fn bunch_of(&self, t: TransIdx) -> BunchIdx {
        self.action_block_slices[self.action_block_slice_of(t)].bunch
    }

    /// Sort key of the bunch of the transition at position `pos` of the
    /// successor view.
    pub fn bunch_key_at_succ(&self, pos: usize) -> usize {
        self.bunches[self.bunch_of(self.succ[pos])].sort_key
    }

    pub fn swap_pred(&mut self, a: usize, b: usize) {
        self.pred.swap(a, b);
        self.info[self.pred[a]].pred_pos = a;
        self.info[self.pred[b]].pred_pos = b;
    }

    pub fn swap_succ(&mut self, a: usize, b: usize) {
        self.succ.swap(a, b);
        self.info[self.succ[a]].succ_pos = a;
        self.info[self.succ[b]].succ_pos = b;
    }

    pub fn swap_action_block(&mut self, a: usize, b: usize) {
        self.action_block.swap(a, b);
        self.info[self.action_block[a]].action_block_pos = a;
        self.info[self.action_block[b]].action_block_pos = b;
    }

    pub fn swap_block_bunch(&mut self, a: usize, b: usize) {
        self.block_bunch.swap(a, b);
        self.info[self.block_bunch[a]].block_bunch_pos = a;
        self.info[self.block_bunch[b]].block_bunch_pos = b;
    }

    pub fn new_block_bunch_slice(&mut self, begin: usize, end: usize, bunch: BunchIdx, block: BlockIdx) -> SliceIdx {
        self.block_bunch_slices.push(BlockBunchSlice {
            begin,
            end,
            bunch,
            block,
            stable: false,
            prev: None,
            next: None,
            split: None,
        });
        self.block_bunch_slices.len() - 1
    }

    /// Moves `t` from its out-slice to the out-slice that directly follows
    /// it, creating the latter if needed. Returns the old slice if it was
    /// split for the first time.
    pub fn move_to_split_out_slice(&mut self, t: TransIdx) -> Option<SliceIdx> {
        let old = self.out_slice_of(t);
        let (new, created) = match self.out_slices[old].split {
            Some(new) => (new, false),
            None => {
                let end = self.out_slices[old].end;
                self.out_slices.push(OutSlice {
                    begin: end,
                    end,
                    split: None,
                });
                let new = self.out_slices.len() - 1;
                self.out_slices[old].split = Some(new);
                (new, true)
            }
        };
        let pos = self.out_slices[old].end - 1;
        self.swap_succ(self.info[t].succ_pos, pos);
        self.out_slices[old].end = pos;
        self.out_slices[new].begin = pos;
        self.info[t].out_slice = Some(new);
        created.then_some(old)
    }

    /// Moves `t` from its action-block slice to a new slice at the tail of
    /// the old one. Returns the old slice if it was split for the first time.
    pub fn move_to_split_action_block_slice(&mut self, t: TransIdx) -> Option<SliceIdx> {
        let old = self.action_block_slice_of(t);
        let (new, created) = match self.action_block_slices[old].split {
            Some(new) => (new, false),
            None => {
                let slice = &self.action_block_slices[old];
                let split = ActionBlockSlice {
                    begin: slice.end,
                    end: slice.end,
                    bunch: slice.bunch,
                    split: None,
                };
                self.action_block_slices.push(split);
                let new = self.action_block_slices.len() - 1;
                self.action_block_slices[old].split = Some(new);
                (new, true)
            }
        };
        let pos = self.action_block_slices[old].end - 1;
        self.swap_action_block(self.info[t].action_block_pos, pos);
        self.action_block_slices[old].end = pos;
        self.action_block_slices[new].begin = pos;
        self.info[t].action_block_slice = Some(new);
        created.then_some(old)
    }

    /// Moves `t` from its block-bunch slice into the slice `new`, which must
    /// directly follow it in the block-bunch view.
    pub fn move_to_block_bunch_slice(&mut self, t: TransIdx, new: SliceIdx) {
        let old = self.block_bunch_slice_of(t);
        debug_assert_eq!(self.block_bunch_slices[old].end, self.block_bunch_slices[new].begin);
        let pos = self.block_bunch_slices[old].end - 1;
        self.swap_block_bunch(self.info[t].block_bunch_pos, pos);
        self.block_bunch_slices[old].end = pos;
        self.block_bunch_slices[new].begin = pos;
        self.info[t].block_bunch_slice = Some(new);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn t(from: usize, label: usize, to: usize) -> Transition {
        Transition::new(from, label, to)
    }

    #[test]
    fn views_separate_inert_transitions() {
        // 0 -tau-> 1, 0 -a-> 2, 1 -tau-> 1, 2 -a-> 0
        let trans = vec![t(0, 0, 1), t(0, 1, 2), t(1, 0, 1), t(2, 1, 0)];
        let (index, states) = TransitionIndex::new(3, trans, 2, 0, true);
        assert_eq!(index.action_block_inert_begin, 3);
        assert_eq!(index.block_bunch_inert_begin, 3);
        assert_eq!(index.action_block[3], 0);
        assert_eq!(states[0].succ_inert_begin - states[0].succ_begin, 1);
        assert_eq!(states[0].succ_end - states[0].succ_inert_begin, 1);
        assert!(states[2].is_bottom());
        // the tau self-loop is not inert and sorted behind the visible label
        assert_eq!(index.action_block[2], 2);
        assert_eq!(index.action_block_slices.len(), 2);
        assert_eq!(index.nontrivial, vec![0]);
        for (id, info) in index.info.iter().enumerate() {
            assert_eq!(index.pred[info.pred_pos], id);
            assert_eq!(index.succ[info.succ_pos], id);
            assert_eq!(index.action_block[info.action_block_pos], id);
            assert_eq!(index.block_bunch[info.block_bunch_pos], id);
        }
    }

    #[test]
    fn strong_layout_has_no_inert_transitions() {
        let trans = vec![t(0, 0, 1), t(1, 0, 0)];
        let (index, states) = TransitionIndex::new(2, trans, 1, 0, false);
        assert_eq!(index.action_block_inert_begin, 2);
        assert!(states.iter().all(StateInfo::is_bottom));
        assert!(index.nontrivial.is_empty());
    }

    #[test]
    fn slice_list_links() {
        let mut index = TransitionIndex::default();
        let ids: Vec<_> = (0..4).map(|i| index.new_block_bunch_slice(i, i, 0, 0)).collect();
        let mut list = SliceList::default();
        list.push_back(&mut index.block_bunch_slices, ids[1]);
        list.push_front(&mut index.block_bunch_slices, ids[0]);
        list.insert_after(&mut index.block_bunch_slices, ids[1], ids[3]);
        list.insert_before(&mut index.block_bunch_slices, ids[3], ids[2]);
        assert_eq!(list.iter(&index.block_bunch_slices).collect::<Vec<_>>(), ids);
        list.remove(&mut index.block_bunch_slices, ids[0]);
        list.remove(&mut index.block_bunch_slices, ids[3]);
        assert_eq!(list.iter(&index.block_bunch_slices).collect::<Vec<_>>(), vec![ids[1], ids[2]]);
        assert_eq!(list.first, Some(ids[1]));
        assert_eq!(list.last, Some(ids[2]));
    }
}
