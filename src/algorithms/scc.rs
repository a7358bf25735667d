use tracing::{debug, trace};

use crate::lts::{Lts, StateIndex, Transition};

/// The `tau` transitions of an [`Lts`] in compressed adjacency form.
struct TauGraph {
    offsets: Vec<usize>,
    targets: Vec<StateIndex>,
}

impl TauGraph {
    fn new(lts: &Lts) -> Self {
        let n = lts.num_states();
        let mut offsets = vec![0usize; n + 1];
        for t in lts.transitions().iter().filter(|t| lts.is_tau(t.label)) {
            offsets[t.from + 1] += 1;
        }
        for s in 0..n {
            offsets[s + 1] += offsets[s];
        }
        let mut targets = vec![0; offsets[n]];
        let mut next = offsets.clone();
        for t in lts.transitions().iter().filter(|t| lts.is_tau(t.label)) {
            targets[next[t.from]] = t.to;
            next[t.from] += 1;
        }
        Self { offsets, targets }
    }

    fn num_states(&self) -> usize {
        self.offsets.len() - 1
    }
}

/// Computes the strongly connected components of the `tau` graph with an
/// iterative version of Tarjan's algorithm.
struct Tarjan<'a> {
    graph: &'a TauGraph,
    index: usize,
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<StateIndex>,
    component: Vec<usize>,
    component_count: usize,
}

impl<'a> Tarjan<'a> {
    fn new(graph: &'a TauGraph) -> Self {
        let n = graph.num_states();
        Self {
            graph,
            index: 0,
            indices: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            component: vec![0; n],
            component_count: 0,
        }
    }

    fn open(&mut self, v: StateIndex) {
        self.indices[v] = Some(self.index);
        self.lowlink[v] = self.index;
        self.index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    fn visit(&mut self, root: StateIndex) {
        self.open(root);
        let mut call_stack = vec![(root, self.graph.offsets[root])];
        while let Some(&(v, next)) = call_stack.last() {
            if next < self.graph.offsets[v + 1] {
                let top = call_stack.len() - 1;
                call_stack[top].1 += 1;
                let w = self.graph.targets[next];
                match self.indices[w] {
                    None => {
                        self.open(w);
                        call_stack.push((w, self.graph.offsets[w]));
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }
            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if Some(self.lowlink[v]) == self.indices[v] {
                let c = self.component_count;
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    self.component[w] = c;
                    if w == v {
                        break;
                    }
                }
                self.component_count += 1;
            }
        }
    }

    fn execute(mut self) -> (Vec<usize>, usize) {
        for v in 0..self.graph.num_states() {
            if self.indices[v].is_none() {
                self.visit(v);
            }
        }
        debug_assert!(self.stack.is_empty());
        (self.component, self.component_count)
    }
}

/// Computes the strongly connected components of the `tau` transitions
/// (including hidden labels). Returns the component of every state and the
/// number of components.
pub fn tau_sccs(lts: &Lts) -> (Vec<usize>, usize) {
    let graph = TauGraph::new(lts);
    Tarjan::new(&graph).execute()
}

/// Contracts every strongly connected component of `tau` transitions of
/// `lts` into a single state and removes duplicate transitions. States on a
/// `tau` cycle are branching bisimilar, so this does not change the result
/// of a branching bisimulation reduction, and it establishes the absence of
/// `tau` cycles that the [`crate::partitioner::Partitioner`] relies on.
///
/// `tau` transitions inside a component are dropped, unless
/// `preserve_divergence` is set: then every component that contains such a
/// transition keeps a `tau` self-loop.
///
/// Returns the new index of every original state.
pub fn scc_reduce(lts: &mut Lts, preserve_divergence: bool) -> Vec<StateIndex> {
    let (component, count) = tau_sccs(lts);
    let tau = lts.tau_label();
    let mut transitions: Vec<Transition> = lts
        .transitions()
        .iter()
        .filter_map(|t| {
            let (from, to) = (component[t.from], component[t.to]);
            if lts.is_tau(t.label) && from == to {
                preserve_divergence.then(|| Transition::new(from, tau, to))
            } else {
                Some(Transition::new(from, t.label, to))
            }
        })
        .collect();
    transitions.sort_unstable();
    transitions.dedup();
    debug!(
        "contracted {} states to {} tau components, {} transitions left",
        lts.num_states(),
        count,
        transitions.len()
    );
    trace!("component of each state: {:?}", component);

    lts.set_num_states(count);
    lts.set_initial_state(component[lts.initial_state()]);
    lts.set_transitions(transitions);
    component
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;

    #[test]
    #[traced_test]
    fn tau_cycle_becomes_one_state() {
        // 0 -tau-> 1 -tau-> 2 -tau-> 0, 2 -a-> 3, 3 -tau-> 3
        let mut lts = Lts::from_edges(4, [(0, "tau", 1), (1, "tau", 2), (2, "tau", 0), (2, "a", 3), (3, "tau", 3)]).unwrap();
        let component = scc_reduce(&mut lts, false);
        assert_eq!(component[0], component[1]);
        assert_eq!(component[1], component[2]);
        assert_ne!(component[0], component[3]);
        assert_eq!(lts.num_states(), 2);
        assert_eq!(lts.num_transitions(), 1);
        assert_eq!(lts.initial_state(), component[0]);
        assert!(logs_contain("contracted 4 states to 2 tau components"));
    }

    #[test]
    fn divergence_keeps_a_self_loop() {
        let mut lts = Lts::from_edges(4, [(0, "tau", 1), (1, "tau", 0), (1, "a", 2), (2, "tau", 3)]).unwrap();
        let component = scc_reduce(&mut lts, true);
        assert_eq!(lts.num_states(), 3);
        let c = component[0];
        let tau = lts.tau_label();
        assert!(lts.transitions().contains(&Transition::new(c, tau, c)));
        // the acyclic tau step stays a normal transition
        assert!(lts.transitions().contains(&Transition::new(component[2], tau, component[3])));
        assert_eq!(lts.num_transitions(), 3);
    }

    #[test]
    fn hidden_labels_form_cycles_too() {
        let mut lts = Lts::from_edges(2, [(0, "h", 1), (1, "tau", 0)]).unwrap();
        lts.hide_label("h");
        let (component, count) = tau_sccs(&lts);
        assert_eq!(count, 1);
        assert_eq!(component, vec![0, 0]);
    }

    #[test]
    fn visible_cycles_are_kept() {
        let mut lts = Lts::from_edges(2, [(0, "a", 1), (1, "a", 0)]).unwrap();
        let component = scc_reduce(&mut lts, false);
        assert_ne!(component[0], component[1]);
        assert_eq!(lts.num_transitions(), 2);
    }
}
