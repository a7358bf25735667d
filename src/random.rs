use tracing::trace;

use crate::lts::Lts;

/// Name of the `i`-th visible label: `a`, `b`, ..., `z`, `a1`, `b1`, ...
fn label_name(i: usize) -> String {
    let letter = char::from(b'a' + (i % 26) as u8);
    match i / 26 {
        0 => letter.to_string(),
        round => format!("{letter}{round}"),
    }
}

/// Generates a random transition system with initial state 0. Label 0 is
/// `tau`, the other `num_labels - 1` labels are visible. Every state gets
/// between 0 and `outdegree` outgoing transitions with uniformly chosen
/// labels and targets, so duplicates and self-loops may occur.
///
/// # Panics
///
/// If `num_states` or `num_labels` is zero.
pub fn random_lts_with_rng(rng: &mut fastrand::Rng, num_states: usize, num_labels: usize, outdegree: usize) -> Lts {
    assert!(num_states > 0, "a random system needs at least one state");
    assert!(num_labels > 0, "a random system needs at least the tau label");
    let mut lts = Lts::new(num_states, 0);
    let labels: Vec<_> = std::iter::once(lts.tau_label())
        .chain((1..num_labels).map(|i| lts.add_label(&label_name(i - 1))))
        .collect();
    for from in 0..num_states {
        for _ in 0..rng.usize(0..=outdegree) {
            let label = labels[rng.usize(..labels.len())];
            lts.add_transition(from, label, rng.usize(..num_states));
        }
    }
    trace!("generated random system: {}", lts);
    lts
}

/// Like [`random_lts_with_rng`], with a freshly seeded generator.
pub fn random_lts(num_states: usize, num_labels: usize, outdegree: usize) -> Lts {
    random_lts_with_rng(&mut fastrand::Rng::new(), num_states, num_labels, outdegree)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn respects_bounds() {
        let lts = random_lts(20, 4, 3);
        assert_eq!(lts.num_states(), 20);
        assert_eq!(lts.num_labels(), 4);
        assert_eq!(lts.labels(), &["tau", "a", "b", "c"]);
        assert!(lts.num_transitions() <= 60);
        assert!(lts.transitions().iter().all(|t| t.to < 20 && t.label < 4));
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = random_lts_with_rng(&mut fastrand::Rng::with_seed(3), 8, 3, 2);
        let b = random_lts_with_rng(&mut fastrand::Rng::with_seed(3), 8, 3, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn label_names_wrap_around() {
        assert_eq!(label_name(0), "a");
        assert_eq!(label_name(25), "z");
        assert_eq!(label_name(27), "b1");
    }
}
