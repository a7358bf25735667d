use std::io::Read;

use anyhow::Context;
use clap::ArgMatches;
use lts_bisim::prelude::*;
use tracing::{debug, warn};

pub fn to_file_or_stdout(maybe_file_name: Option<&String>, output: &str) -> anyhow::Result<()> {
    if let Some(file_name) = maybe_file_name {
        debug!("Writing output to {}", file_name);
        std::fs::write(file_name, output).with_context(|| format!("could not write {file_name}"))?;
    } else {
        debug!("No output file specified, using stdout");
        print!("{output}");
    }
    Ok(())
}

pub fn from_file_or_stdin(maybe_file_name: Option<&String>) -> anyhow::Result<String> {
    match maybe_file_name {
        Some(f) => std::fs::read_to_string(f).with_context(|| format!("could not read {f}")),
        None => {
            debug!("No input file specified, using stdin");
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("error when reading from stdin")?;
            Ok(buf)
        }
    }
}

/// Reads the `.aut` file named by argument `id` (stdin if absent) and hides
/// the labels given with `--tau`.
pub fn read_lts(matches: &ArgMatches, id: &str) -> anyhow::Result<Lts> {
    let file_name = matches.get_one::<String>(id);
    let text = from_file_or_stdin(file_name)?;
    let mut lts = read_aut(&text).with_context(|| {
        format!(
            "could not parse {}",
            file_name.map_or("standard input", String::as_str)
        )
    })?;
    if let Some(hidden) = matches.get_many::<String>("tau") {
        for name in hidden {
            if !lts.hide_label(name) {
                warn!("label {} does not occur and cannot be hidden", name);
            }
        }
    }
    Ok(lts)
}

pub fn equivalence(matches: &ArgMatches) -> anyhow::Result<Equivalence> {
    let name = matches
        .get_one::<String>("equivalence")
        .map_or("bisim", String::as_str);
    Ok(name.parse()?)
}
