use clap::{command, Arg, ArgAction, ArgMatches, Command};
use lts_bisim::{prelude::*, table::transition_table};
use owo_colors::OwoColorize;
use tracing::{debug, info, Level};

mod io;

fn equivalence_arg() -> Arg {
    Arg::new("equivalence")
        .short('e')
        .long("equivalence")
        .help("Equivalence to reduce or compare modulo")
        .value_parser(["bisim", "branching-bisim", "dpbranching-bisim"])
        .default_value("bisim")
}

fn tau_arg() -> Arg {
    Arg::new("tau")
        .long("tau")
        .help("Comma separated labels that are treated as tau")
        .value_delimiter(',')
        .action(ArgAction::Append)
}

fn reduce(matches: &ArgMatches) -> anyhow::Result<()> {
    let equivalence = io::equivalence(matches)?;
    let mut lts = io::read_lts(matches, "input")?;
    bisimulation_reduce(&mut lts, equivalence);
    info!("quotient has {} equivalence classes", lts.num_states());
    io::to_file_or_stdout(matches.get_one("output"), &to_aut_string(&lts))
}

fn compare(matches: &ArgMatches) -> anyhow::Result<()> {
    let equivalence = io::equivalence(matches)?;
    let mut first = io::read_lts(matches, "first")?;
    let second = io::read_lts(matches, "second")?;
    let equal = destructive_bisimulation_compare(&mut first, &second, equivalence);
    debug!("initial states are {} equivalent: {}", equivalence, equal);
    println!("{equal}");
    Ok(())
}

fn show_info(matches: &ArgMatches) -> anyhow::Result<()> {
    let equivalence = io::equivalence(matches)?;
    let lts = io::read_lts(matches, "input")?;
    let classes = bisimulation_partition(&lts, equivalence);
    let num_classes = classes.iter().max().map_or(0, |&c| c + 1);
    println!("{:>14} {}", "states:".bold(), lts.num_states());
    println!("{:>14} {}", "transitions:".bold(), lts.num_transitions());
    println!("{:>14} {}", "labels:".bold(), lts.num_labels());
    println!(
        "{:>14} {} modulo {}",
        "classes:".bold(),
        num_classes.green().bold(),
        equivalence
    );
    if matches.get_flag("table") {
        println!("{}", transition_table(&lts, Some(classes.as_slice())));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let matches = command!()
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .conflicts_with("debug"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Turn on debugging information")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .subcommand(
            Command::new("reduce")
                .about("Reduce an .aut file modulo the chosen equivalence")
                .arg(Arg::new("input").short('i').long("input"))
                .arg(Arg::new("output").short('o').long("output"))
                .arg(equivalence_arg())
                .arg(tau_arg()),
        )
        .subcommand(
            Command::new("compare")
                .about("Decide whether the initial states of two .aut files are equivalent")
                .arg(Arg::new("first").required(true))
                .arg(Arg::new("second").required(true))
                .arg(equivalence_arg())
                .arg(tau_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Print statistics of an .aut file")
                .arg(Arg::new("input").short('i').long("input"))
                .arg(
                    Arg::new("table")
                        .short('t')
                        .long("table")
                        .help("Also print the transitions together with the class of every state")
                        .action(ArgAction::SetTrue),
                )
                .arg(equivalence_arg())
                .arg(tau_arg()),
        )
        .subcommand_required(true)
        .get_matches();

    let level = if matches.get_flag("verbose") {
        Level::TRACE
    } else if matches.get_flag("debug") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_level(true)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match matches.subcommand() {
        Some(("reduce", sub)) => reduce(sub),
        Some(("compare", sub)) => compare(sub),
        Some(("info", sub)) => show_info(sub),
        _ => unreachable!(),
    }
}
