//! CLI for mcspectra — Monte Carlo cross-spectra, noise bias and covariance.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mcspectra")]
#[command(about = "mcspectra — cross-spectra and noise bias from Monte Carlo map ensembles")]
#[command(version = mcspectra_core::VERSION)]
struct Cli {
    /// Only log errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Increase log verbosity (-v progress, -vv debug)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute spectra for every mask, fitting scheme and component.
    /// Optionally estimate the noise-bias mean and covariance.
    Run {
        /// Data configuration (identifier, monte_carlo, hdf5_path)
        #[arg(long, short)]
        data: PathBuf,

        /// Model configuration (identifier, components)
        #[arg(long, short)]
        model: PathBuf,

        /// Masking configuration (fitting schemes, masks)
        #[arg(long, short = 'p')]
        masking: PathBuf,

        /// Estimate the noise bias for components with a noise model
        #[arg(long)]
        estimate_noise: bool,

        /// Seed for noise draws (overrides the data configuration)
        #[arg(long)]
        seed: Option<u64>,

        /// Compute realization pairs on the calling thread
        #[arg(long)]
        sequential: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List datasets in a store with their shapes
    Inspect {
        /// Store root directory
        store: PathBuf,

        /// Only list datasets under this path
        #[arg(long)]
        prefix: Option<String>,
    },
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::Run {
            data,
            model,
            masking,
            estimate_noise,
            seed,
            sequential,
            json,
        } => commands::run::run(commands::run::RunCommandConfig {
            data_path: &data,
            model_path: &model,
            masking_path: &masking,
            estimate_noise,
            seed,
            sequential,
            json,
        }),
        Commands::Inspect { store, prefix } => commands::inspect::run(&store, prefix.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
