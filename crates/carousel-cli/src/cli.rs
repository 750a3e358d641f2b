//! Command line definition

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use semver::Version;
use std::path::PathBuf;

/// Default file a failed transition is written to
pub const DEFAULT_OUTPUT: &str = "err.json";

fn parse_version(text: &str) -> Result<Version, String> {
    Version::parse(text.trim_start_matches('v')).map_err(|err| format!("invalid version {text:?}: {err}"))
}

/// Flags shared by `rollout` and `resume`
fn transition_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("dry-run")
                .short('d')
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print each apply instead of running it"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_parser(value_parser!(usize))
                .help("Maximum nodes changed per step"),
        )
        .arg(
            Arg::new("skip-first-n")
                .long("skip-first-n")
                .value_parser(value_parser!(usize))
                .help("Never leave a group with 1..=N nodes mid-rollout"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Hide terraform output"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_OUTPUT)
                .help("Where to write the step file when a step fails"),
        )
        .arg(
            Arg::new("validator")
                .long("validator")
                .help("Command run as `<CMD> <hostname>`; exit status 0 marks a valid host"),
        )
        .arg(
            Arg::new("max-attempts")
                .long("max-attempts")
                .value_parser(value_parser!(u32))
                .help("Give up on a step after this many applications"),
        )
}

/// Build the `carousel` command
#[must_use]
pub fn build_cli() -> Command {
    Command::new("carousel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Zero-downtime blue/green rollouts driven through terraform")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (default: $CAROUSEL_CONFIG or ./carousel.yaml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log as JSON lines"),
        )
        .subcommand(transition_args(
            Command::new("rollout")
                .about("Roll the cluster over to COUNT nodes at VERSION")
                .arg(
                    Arg::new("count")
                        .required(true)
                        .value_parser(value_parser!(usize))
                        .help("Number of nodes in the new group"),
                )
                .arg(
                    Arg::new("version")
                        .required(true)
                        .value_parser(parse_version)
                        .help("Version to deploy (semver)"),
                ),
        ))
        .subcommand(transition_args(
            Command::new("resume")
                .about("Resume a failed transition from its step file")
                .arg(
                    Arg::new("step-file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Step file written by a failed rollout"),
                ),
        ))
        .subcommand(
            Command::new("state")
                .about("Show the current cluster")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                )
                .arg(
                    Arg::new("full")
                        .long("full")
                        .action(ArgAction::SetTrue)
                        .help("List hostnames instead of counts"),
                ),
        )
        .subcommand(
            Command::new("taint").about("Taint hosts so the next apply replaces them").arg(
                Arg::new("hosts")
                    .required(true)
                    .num_args(1..)
                    .help("Hostnames to taint"),
            ),
        )
        .subcommand(
            Command::new("version").about("Print version information").arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Output as JSON"),
            ),
        )
}

/// Options of `rollout` and `resume`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionArgs {
    /// Describe steps only
    pub dry_run: bool,
    /// Hide terraform output
    pub quiet: bool,
    /// Step file destination
    pub output: PathBuf,
    /// Batch size override
    pub batch_size: Option<usize>,
    /// Skip band override
    pub skip_first_n: Option<usize>,
    /// Validator command override
    pub validator: Option<String>,
    /// Retry bound override
    pub max_attempts: Option<u32>,
}

impl TransitionArgs {
    /// Read from `rollout` or `resume` matches
    #[must_use]
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            dry_run: matches.get_flag("dry-run"),
            quiet: matches.get_flag("quiet"),
            output: matches
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            batch_size: matches.get_one::<usize>("batch-size").copied(),
            skip_first_n: matches.get_one::<usize>("skip-first-n").copied(),
            validator: matches.get_one::<String>("validator").cloned(),
            max_attempts: matches.get_one::<u32>("max-attempts").copied(),
        }
    }
}
