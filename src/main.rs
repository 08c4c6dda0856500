mod analysis;
mod config;
mod engine;
mod manager;
mod model;
mod reference;
mod stats;

use crate::manager::{Manager, Overrides};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Simulation directory holding `config.toml` and the runs.
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate a new run.
    Create {
        /// Number of ensemble members (overrides the config).
        #[arg(long)]
        n_members: Option<usize>,

        /// Number of time points including t = 0 (overrides the config).
        #[arg(long)]
        n_steps: Option<usize>,

        /// Seed of the random number generator (overrides the config).
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Compare every run with the reference curves.
    Analyze,

    /// Remove every run.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Create {
            n_members,
            n_steps,
            seed,
        } => mgr.create_run(Overrides {
            n_members,
            n_steps,
            seed,
        })?,
        Command::Analyze => mgr.analyze_sim()?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
