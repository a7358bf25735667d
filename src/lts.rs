use std::fmt;

use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

use crate::Map;

/// Index of a state, below [`Lts::num_states`].
pub type StateIndex = usize;
/// Index of a label in the label table of an [`Lts`].
pub type LabelIndex = usize;

/// Name of the invisible action. It always has label index 0.
pub const TAU: &str = "tau";

/// A labelled transition `from --label--> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition {
    /// Source state.
    pub from: StateIndex,
    /// Action label.
    pub label: LabelIndex,
    /// Target state.
    pub to: StateIndex,
}

impl Transition {
    /// Creates the transition `from --label--> to`.
    pub fn new(from: StateIndex, label: LabelIndex, to: StateIndex) -> Self {
        Self { from, label, to }
    }
}

/// Raised when a transition system is built from inconsistent data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LtsError {
    /// A state index is not below the number of states.
    #[error("state {state} does not exist in a system with {num_states} states")]
    StateOutOfRange {
        /// The offending state.
        state: StateIndex,
        /// Number of states in the system.
        num_states: usize,
    },
    /// A label index is not below the number of labels.
    #[error("label {label} does not exist in a system with {num_labels} labels")]
    LabelOutOfRange {
        /// The offending label.
        label: LabelIndex,
        /// Number of labels in the system.
        num_labels: usize,
    },
    /// The system would have no states, hence no initial state.
    #[error("a labelled transition system needs at least one state")]
    NoStates,
}

/// A labelled transition system: a number of states, an initial state, a
/// table of labels and a list of transitions.
///
/// Label 0 is always [`TAU`]. Further labels can be declared *hidden*; the
/// bisimulation algorithms then treat them exactly like `tau`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lts {
    num_states: usize,
    initial_state: StateIndex,
    labels: Vec<String>,
    hidden: Vec<bool>,
    transitions: Vec<Transition>,
}

impl Lts {
    /// Creates a system without transitions.
    ///
    /// # Panics
    ///
    /// If `initial_state` is not below `num_states`.
    pub fn new(num_states: usize, initial_state: StateIndex) -> Self {
        assert!(
            initial_state < num_states,
            "initial state {initial_state} out of range for {num_states} states"
        );
        Self {
            num_states,
            initial_state,
            labels: vec![TAU.to_string()],
            hidden: vec![false],
            transitions: Vec::new(),
        }
    }

    /// Builds a system with initial state 0 from `(from, label, to)` triples,
    /// declaring labels as they are encountered.
    ///
    /// ```
    /// use lts_bisim::lts::Lts;
    ///
    /// let lts = Lts::from_edges(2, [(0, "a", 1), (1, "tau", 0)]).unwrap();
    /// assert_eq!(lts.num_labels(), 2);
    /// assert_eq!(lts.num_transitions(), 2);
    /// ```
    pub fn from_edges<'a, I>(num_states: usize, edges: I) -> Result<Self, LtsError>
    where
        I: IntoIterator<Item = (StateIndex, &'a str, StateIndex)>,
    {
        if num_states == 0 {
            return Err(LtsError::NoStates);
        }
        let mut lts = Self::new(num_states, 0);
        for (from, label, to) in edges {
            let label = lts.add_label(label);
            lts.try_add_transition(from, label, to)?;
        }
        Ok(lts)
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Number of labels, including `tau`.
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Number of transitions.
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// The initial state.
    pub fn initial_state(&self) -> StateIndex {
        self.initial_state
    }

    /// Changes the initial state.
    pub fn set_initial_state(&mut self, s: StateIndex) {
        assert!(s < self.num_states, "initial state {s} out of range");
        self.initial_state = s;
    }

    /// Changes the number of states. Transitions are not checked.
    pub fn set_num_states(&mut self, n: usize) {
        self.num_states = n;
    }

    /// All transitions, in insertion order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Replaces all transitions. They are not checked.
    pub fn set_transitions(&mut self, transitions: Vec<Transition>) {
        self.transitions = transitions;
    }

    /// Removes all transitions.
    pub fn clear_transitions(&mut self) {
        self.transitions.clear();
    }

    /// The label table; index 0 is `tau`.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Name of `label`.
    pub fn label_name(&self, label: LabelIndex) -> &str {
        &self.labels[label]
    }

    /// Index of the label called `name`, if it exists.
    pub fn label_index(&self, name: &str) -> Option<LabelIndex> {
        self.labels.iter().position(|l| l == name)
    }

    /// The label index of `tau`.
    pub fn tau_label(&self) -> LabelIndex {
        0
    }

    /// Returns the index of label `name`, adding it to the table if needed.
    pub fn add_label(&mut self, name: &str) -> LabelIndex {
        match self.label_index(name) {
            Some(label) => label,
            None => {
                self.labels.push(name.to_string());
                self.hidden.push(false);
                self.labels.len() - 1
            }
        }
    }

    /// Declares label `name` hidden. Returns false if there is no such label.
    pub fn hide_label(&mut self, name: &str) -> bool {
        match self.label_index(name) {
            Some(label) => {
                trace!("hiding label {}", name);
                self.hidden[label] = true;
                true
            }
            None => false,
        }
    }

    /// Whether `label` is `tau` or hidden.
    pub fn is_tau(&self, label: LabelIndex) -> bool {
        label == self.tau_label() || self.hidden[label]
    }

    /// Maps hidden labels to `tau` and leaves all others unchanged.
    pub fn apply_hidden_label_map(&self, label: LabelIndex) -> LabelIndex {
        if self.is_tau(label) {
            self.tau_label()
        } else {
            label
        }
    }

    /// Adds a transition.
    ///
    /// # Panics
    ///
    /// If a state or the label is out of range.
    pub fn add_transition(&mut self, from: StateIndex, label: LabelIndex, to: StateIndex) {
        if let Err(e) = self.try_add_transition(from, label, to) {
            panic!("{e}");
        }
    }

    /// Adds a transition, or reports which index is out of range.
    pub fn try_add_transition(&mut self, from: StateIndex, label: LabelIndex, to: StateIndex) -> Result<(), LtsError> {
        for state in [from, to] {
            if state >= self.num_states {
                return Err(LtsError::StateOutOfRange {
                    state,
                    num_states: self.num_states,
                });
            }
        }
        if label >= self.labels.len() {
            return Err(LtsError::LabelOutOfRange {
                label,
                num_labels: self.labels.len(),
            });
        }
        self.transitions.push(Transition::new(from, label, to));
        Ok(())
    }

    /// Successor states of `s` under `label`.
    pub fn successors(&self, s: StateIndex, label: LabelIndex) -> impl Iterator<Item = StateIndex> + '_ {
        self.transitions
            .iter()
            .filter(move |t| t.from == s && t.label == label)
            .map(|t| t.to)
    }

    /// Replaces every hidden label by `tau` and clears the hidden flags.
    pub fn apply_hidden_labels(&mut self) {
        let mapped: Vec<LabelIndex> = (0..self.labels.len()).map(|l| self.apply_hidden_label_map(l)).collect();
        for t in &mut self.transitions {
            t.label = mapped[t.label];
        }
        self.hidden.iter_mut().for_each(|h| *h = false);
    }

    /// Appends the states and transitions of `other` to `self`. Labels are
    /// matched by name, and hidden labels of either system become `tau`.
    /// Returns the index that the initial state of `other` has in the result.
    pub fn merge(&mut self, other: &Lts) -> StateIndex {
        self.apply_hidden_labels();
        let (label_map, new_labels) = {
            let mut names: Map<&str, LabelIndex> = Map::default();
            for (label, name) in self.labels.iter().enumerate() {
                names.insert(name.as_str(), label);
            }
            let mut new_labels = Vec::new();
            let label_map: Vec<LabelIndex> = (0..other.num_labels())
                .map(|l| {
                    if other.is_tau(l) {
                        return self.tau_label();
                    }
                    let name = other.label_name(l);
                    match names.get(name) {
                        Some(&label) => label,
                        None => {
                            let label = self.labels.len() + new_labels.len();
                            names.insert(name, label);
                            new_labels.push(name.to_string());
                            label
                        }
                    }
                })
                .collect();
            (label_map, new_labels)
        };
        self.hidden.extend(new_labels.iter().map(|_| false));
        self.labels.extend(new_labels);

        let offset = self.num_states;
        self.transitions.extend(
            other
                .transitions
                .iter()
                .map(|t| Transition::new(t.from + offset, label_map[t.label], t.to + offset)),
        );
        self.num_states += other.num_states;
        trace!(
            "merged {} states, {} labels after merge",
            other.num_states,
            self.labels.len()
        );
        other.initial_state + offset
    }
}

impl fmt::Display for Lts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} states, initial state {}, {} transitions",
            self.num_states,
            self.initial_state,
            self.transitions.len()
        )?;
        write!(
            f,
            "{}",
            self.transitions
                .iter()
                .map(|t| format!("{} --{}--> {}", t.from, self.labels[t.label], t.to))
                .join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::{assert_eq, assert_ne};

    use super::*;

    #[test]
    fn labels_are_interned() {
        let mut lts = Lts::new(2, 0);
        let a = lts.add_label("a");
        assert_eq!(lts.add_label("a"), a);
        assert_eq!(lts.add_label(TAU), lts.tau_label());
        assert_ne!(a, lts.tau_label());
        assert_eq!(lts.label_name(a), "a");
    }

    #[test]
    fn out_of_range_transitions_are_rejected() {
        let mut lts = Lts::new(2, 0);
        assert_eq!(
            lts.try_add_transition(0, 0, 2),
            Err(LtsError::StateOutOfRange { state: 2, num_states: 2 })
        );
        assert_eq!(
            lts.try_add_transition(0, 5, 1),
            Err(LtsError::LabelOutOfRange { label: 5, num_labels: 1 })
        );
        assert_eq!(Lts::from_edges(0, []), Err(LtsError::NoStates));
    }

    #[test]
    fn hidden_labels_map_to_tau() {
        let mut lts = Lts::from_edges(2, [(0, "a", 1), (1, "b", 0)]).unwrap();
        assert!(lts.hide_label("a"));
        assert!(!lts.hide_label("c"));
        let a = lts.label_index("a").unwrap();
        let b = lts.label_index("b").unwrap();
        assert!(lts.is_tau(a));
        assert_eq!(lts.apply_hidden_label_map(a), lts.tau_label());
        assert_eq!(lts.apply_hidden_label_map(b), b);
    }

    #[test]
    fn merge_offsets_states_and_matches_labels() {
        let mut l1 = Lts::from_edges(2, [(0, "a", 1)]).unwrap();
        let mut l2 = Lts::from_edges(3, [(0, "b", 1), (1, "a", 2)]).unwrap();
        l2.set_initial_state(1);
        l2.hide_label("b");
        let init = l1.merge(&l2);
        assert_eq!(init, 3);
        assert_eq!(l1.num_states(), 5);
        assert_eq!(l1.num_labels(), 2);
        let a = l1.label_index("a").unwrap();
        assert_eq!(
            l1.transitions(),
            &[Transition::new(0, a, 1), Transition::new(2, 0, 3), Transition::new(3, a, 4)]
        );
    }

    #[test]
    fn display_lists_transitions() {
        let lts = Lts::from_edges(2, [(0, "a", 1)]).unwrap();
        assert_eq!(lts.to_string(), "2 states, initial state 0, 1 transitions\n0 --a--> 1");
    }
}
