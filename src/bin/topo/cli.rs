use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use topopt::problems::NAMES;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Density-based topology optimization of linear elastic structures"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an optimization described by a TOML configuration file.
    Run(RunArgs),
    /// Print a reference problem as TOML.
    Problem(ProblemArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the configuration file.
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Write the per-iteration history to this CSV file.
    #[arg(long, value_name = "PATH")]
    pub history: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProblemArgs {
    /// Name of the reference problem.
    #[arg(value_parser = clap::builder::PossibleValuesParser::new(NAMES))]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_history() {
        let cli = Cli::parse_from(["topo", "-vv", "run", "beam.toml", "--history", "out.csv"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("beam.toml"));
                assert_eq!(args.history, Some(PathBuf::from("out.csv")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_problem() {
        assert!(Cli::try_parse_from(["topo", "problem", "shell_3d"]).is_err());
    }
}
