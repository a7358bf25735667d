use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::{debug, trace};

use crate::lts::{Lts, LtsError, StateIndex};

/// Raised when `.aut` input cannot be turned into an [`Lts`]. Line numbers
/// start at 1.
#[derive(Debug, Error)]
pub enum AutError {
    /// The input contains no header line.
    #[error("input is empty, expected a header `des (initial, transitions, states)`")]
    Empty,
    /// The first line is not of the form `des (initial, transitions, states)`.
    #[error("line {line}: malformed header, expected `des (initial, transitions, states)`")]
    MalformedHeader {
        /// Line of the header.
        line: usize,
    },
    /// A line is not of the form `(from, "label", to)`.
    #[error("line {line}: malformed transition `{text}`")]
    MalformedTransition {
        /// Line of the transition.
        line: usize,
        /// The line as read.
        text: String,
    },
    /// A state index is not below the number of states declared in the header.
    #[error("line {line}: state {state} does not exist in a system with {num_states} states")]
    StateOutOfRange {
        /// Line of the transition.
        line: usize,
        /// The offending state.
        state: StateIndex,
        /// Number of states declared in the header.
        num_states: usize,
    },
    /// The header announces a different number of transitions than follow it.
    #[error("header announces {expected} transitions, but {found} were read")]
    TransitionCountMismatch {
        /// Count from the header.
        expected: usize,
        /// Transitions actually read.
        found: usize,
    },
    /// Reading the input failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

struct Header {
    initial: StateIndex,
    num_transitions: usize,
    num_states: usize,
}

fn parse_header(text: &str, line: usize) -> Result<Header, AutError> {
    let malformed = || AutError::MalformedHeader { line };
    let inner = text
        .trim()
        .strip_prefix("des")
        .map(str::trim)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(malformed)?;
    let numbers: Vec<usize> = inner
        .split(',')
        .map(|n| n.trim().parse().map_err(|_| malformed()))
        .collect::<Result<_, _>>()?;
    match numbers[..] {
        [initial, num_transitions, num_states] if initial < num_states => Ok(Header {
            initial,
            num_transitions,
            num_states,
        }),
        [initial, _, num_states] if num_states > 0 => Err(AutError::StateOutOfRange {
            line,
            state: initial,
            num_states,
        }),
        _ => Err(malformed()),
    }
}

/// Splits `(from, "label", to)` at the first and the last comma, so labels
/// may contain commas themselves.
fn parse_transition(text: &str, line: usize) -> Result<(StateIndex, &str, StateIndex), AutError> {
    let malformed = || AutError::MalformedTransition {
        line,
        text: text.to_string(),
    };
    let inner = text
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(malformed)?;
    let first = inner.find(',').ok_or_else(malformed)?;
    let last = inner.rfind(',').ok_or_else(malformed)?;
    if first == last {
        return Err(malformed());
    }
    let from = inner[..first].trim().parse().map_err(|_| malformed())?;
    let to = inner[last + 1..].trim().parse().map_err(|_| malformed())?;
    let label = inner[first + 1..last].trim();
    let label = label
        .strip_prefix('"')
        .and_then(|l| l.strip_suffix('"'))
        .unwrap_or(label);
    Ok((from, label, to))
}

/// Reads a transition system in `.aut` format from `reader`.
pub fn read_aut_from<R: BufRead>(reader: R) -> Result<Lts, AutError> {
    let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));
    let header = loop {
        match lines.next() {
            None => return Err(AutError::Empty),
            Some((_, text)) if text.as_ref().is_ok_and(|t| t.trim().is_empty()) => continue,
            Some((line, text)) => break parse_header(&text?, line)?,
        }
    };
    let mut lts = Lts::new(header.num_states, header.initial);
    let mut found = 0;
    for (line, text) in lines {
        let text = text?;
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let (from, label, to) = parse_transition(text, line)?;
        let label = lts.add_label(label);
        lts.try_add_transition(from, label, to).map_err(|e| match e {
            LtsError::StateOutOfRange { state, num_states } => AutError::StateOutOfRange {
                line,
                state,
                num_states,
            },
            _ => AutError::MalformedTransition {
                line,
                text: text.to_string(),
            },
        })?;
        found += 1;
    }
    if found != header.num_transitions {
        return Err(AutError::TransitionCountMismatch {
            expected: header.num_transitions,
            found,
        });
    }
    debug!(
        "read .aut with {} states, {} transitions and {} labels",
        lts.num_states(),
        lts.num_transitions(),
        lts.num_labels()
    );
    Ok(lts)
}

/// Reads a transition system in `.aut` format from a string.
///
/// ```
/// use lts_bisim::prelude::*;
///
/// let lts = read_aut("des (0, 2, 2)\n(0, \"a\", 1)\n(1, tau, 0)\n").unwrap();
/// assert_eq!(lts.num_states(), 2);
/// assert!(lts.is_tau(lts.transitions()[1].label));
/// ```
pub fn read_aut(input: &str) -> Result<Lts, AutError> {
    read_aut_from(input.as_bytes())
}

/// Writes `lts` in `.aut` format, with every label quoted. Hidden labels are
/// written under their own name.
pub fn write_aut<W: Write>(lts: &Lts, mut writer: W) -> io::Result<()> {
    writeln!(
        writer,
        "des ({},{},{})",
        lts.initial_state(),
        lts.num_transitions(),
        lts.num_states()
    )?;
    for t in lts.transitions() {
        writeln!(writer, "({},\"{}\",{})", t.from, lts.label_name(t.label), t.to)?;
    }
    trace!("wrote {} transitions", lts.num_transitions());
    writer.flush()
}

/// Renders `lts` in `.aut` format.
pub fn to_aut_string(lts: &Lts) -> String {
    let mut out = Vec::new();
    write_aut(lts, &mut out).expect("writing to a vector cannot fail");
    String::from_utf8(out).expect("labels are valid UTF-8")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;

    const SAMPLE: &str = "des (0,4,3)
(0,\"a\",1)
(1,\"tau\",2)

(2, \"send(1, 2)\", 0)
(2,b,2)
";

    #[test]
    #[traced_test]
    fn reads_labels_with_commas() {
        let lts = read_aut(SAMPLE).unwrap();
        assert_eq!(lts.num_states(), 3);
        assert_eq!(lts.num_transitions(), 4);
        assert_eq!(lts.labels(), &["tau", "a", "send(1, 2)", "b"]);
        assert_eq!(lts.transitions()[1].label, lts.tau_label());
        assert!(logs_contain("read .aut with 3 states"));
    }

    #[test]
    fn writing_and_reading_is_a_fixpoint() {
        let text = to_aut_string(&read_aut(SAMPLE).unwrap());
        assert_eq!(to_aut_string(&read_aut(&text).unwrap()), text);
        assert!(text.starts_with("des (0,4,3)\n(0,\"a\",1)\n"));
    }

    #[test]
    fn reports_errors_with_lines() {
        assert!(matches!(read_aut(""), Err(AutError::Empty)));
        assert!(matches!(read_aut("lts (0,0,1)"), Err(AutError::MalformedHeader { line: 1 })));
        assert!(matches!(
            read_aut("des (0,1,2)\n(0,\"a\")"),
            Err(AutError::MalformedTransition { line: 2, .. })
        ));
        assert!(matches!(
            read_aut("des (0,1,2)\n(0,\"a\",5)"),
            Err(AutError::StateOutOfRange { line: 2, state: 5, .. })
        ));
        assert!(matches!(
            read_aut("des (0,2,2)\n(0,\"a\",1)"),
            Err(AutError::TransitionCountMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(read_aut("des (3,0,2)"), Err(AutError::StateOutOfRange { state: 3, .. })));
    }
}
