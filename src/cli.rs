//! Command line interface of transforma, built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (run, demo, config) and
//! the global flags (--jobs-dir, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// transforma: run and supervise transformation jobs.
#[derive(Debug, Parser)]
#[command(name = "transforma", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding job working directories (overrides config and env).
    #[arg(long, global = true)]
    pub jobs_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a job, run it until it settles and print its final state.
    Run {
        /// Simulation input value (at least 5).
        #[arg(long, allow_negative_numbers = true)]
        input_value: i64,

        /// Keep the job's working directory instead of deleting it.
        #[arg(long, default_value_t = false)]
        keep: bool,
    },

    /// Walk through the job lifecycle, including the refused transitions.
    Demo,

    /// Print the effective configuration.
    Config,
}
