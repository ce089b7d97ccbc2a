mod cli;
mod logging;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, info};

use topopt::{problems, Controller, DistributedContext, HistoryWriter, TopOptConfig};

use crate::cli::{Cli, Commands, ProblemArgs, RunArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    TopOpt(#[from] topopt::TopOptError),

    #[error(transparent)]
    Config(#[from] topopt::ConfigError),

    #[error("failed to write TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown reference problem `{0}`")]
    UnknownProblem(String),
}

fn main() {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet);
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Problem(args) => problem(args),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> Result<(), CliError> {
    let config = TopOptConfig::from_file(&args.config)?;
    info!(config = %args.config.display(), "loaded configuration");
    config.log_summary();

    let mut controller = Controller::from_config(DistributedContext::serial(), &config)?;
    if let Some(path) = &args.history {
        controller.add_observer(Box::new(HistoryWriter::from_path(path)?));
    }

    let result = controller.run()?;
    let last = result.history.last();
    println!("Termination:      {}", result.termination);
    println!("Iterations:       {}", result.iterations);
    if let Some(record) = last {
        println!("Objective:        {:.6e}", record.objective);
        println!("Compliance:       {:.6e}", record.compliance);
        if let Some(u_out) = record.output_displacement {
            println!("Output disp.:     {:.6e}", u_out);
        }
    }
    println!("Volume fraction:  {:.4}", result.volume_fraction);
    println!("Constraints met:  {}", result.constraints_satisfied);
    if let Some(path) = &args.history {
        println!("History written to {}", path.display());
    }
    Ok(())
}

fn problem(args: ProblemArgs) -> Result<(), CliError> {
    let config = problems::by_name(&args.name).ok_or(CliError::UnknownProblem(args.name))?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
