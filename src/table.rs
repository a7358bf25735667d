use itertools::Itertools;
use owo_colors::OwoColorize;
use tabled::{builder::Builder, settings::Style};

use crate::lts::Lts;

/// Renders the transitions of `lts` as a table with one row per state and
/// one column per label. The initial state is underlined and every cell lists
/// the successors under that label. If `classes` is given, an extra column
/// shows the equivalence class of each state.
pub fn transition_table(lts: &Lts, classes: Option<&[usize]>) -> String {
    let mut successors = vec![vec![Vec::new(); lts.num_labels()]; lts.num_states()];
    for t in lts.transitions() {
        successors[t.from][t.label].push(t.to);
    }

    let mut builder = Builder::default();
    builder.set_header(
        std::iter::once("state".bright_yellow().to_string())
            .chain(lts.labels().iter().enumerate().map(|(label, name)| {
                if lts.is_tau(label) {
                    name.dimmed().to_string()
                } else {
                    name.purple().to_string()
                }
            }))
            .chain(classes.map(|_| "class".bright_yellow().to_string())),
    );
    for (state, targets) in successors.iter_mut().enumerate() {
        let name = if state == lts.initial_state() {
            state.underline().to_string()
        } else {
            state.to_string()
        };
        let mut row = vec![name];
        row.extend(targets.iter_mut().map(|to| {
            if to.is_empty() {
                "⊥".dimmed().to_string()
            } else {
                to.sort_unstable();
                to.dedup();
                to.iter().join(", ")
            }
        }));
        if let Some(classes) = classes {
            row.push(classes[state].green().to_string());
        }
        builder.push_record(row);
    }
    builder.build().with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_successors_per_label() {
        let lts = Lts::from_edges(3, [(0, "a", 2), (0, "a", 1), (1, "b", 1)]).unwrap();
        let table = transition_table(&lts, Some(&[0, 1, 2][..]));
        assert!(table.contains("1, 2"));
        assert!(table.contains("class"));
        assert!(table.contains('⊥'));
    }
}
