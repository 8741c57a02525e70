//! CLI for changesim: sequential vs. iterative change processes under coupled change demand.

mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use commands::ExperimentArgs;

#[derive(Parser)]
#[command(name = "changesim")]
#[command(about = "changesim — does an iterative process absorb change more cheaply than a sequential one?")]
#[command(version = changesim_core::VERSION)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Monte-Carlo experiment and compare both processes.
    /// Results are written to <output>/<timestamp>-<id>/ unless --no-write.
    Run {
        #[command(flatten)]
        experiment: ExperimentArgs,

        /// Directory that receives the experiment folder
        #[arg(long, default_value = "experiments")]
        output: PathBuf,

        /// Print the summary only, write nothing to disk
        #[arg(long)]
        no_write: bool,
    },

    /// Re-run a single run of an experiment and show the phase and sprint traces
    Inspect {
        #[command(flatten)]
        experiment: ExperimentArgs,

        /// Which run of the experiment to reproduce (1-based)
        #[arg(long, default_value = "1")]
        run: usize,

        /// Print the report and traces as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the comparison battery on a saved results.csv
    Compare {
        /// Path to results.csv (or the experiment directory containing it)
        path: PathBuf,

        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            experiment,
            output,
            no_write,
        } => commands::run::run(&experiment, (!no_write).then_some(output.as_path())),
        Commands::Inspect {
            experiment,
            run,
            json,
        } => commands::inspect::run(&experiment, run, json),
        Commands::Compare { path, json } => commands::compare::run(&path, json),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}
