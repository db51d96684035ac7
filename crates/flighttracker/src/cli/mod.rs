//! Command-line interface for the `flighttracker` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{ConfigCommand, SearchCommand, ServeCommand, SinkArg, StartCommand};

/// flighttracker - Watch an area for low-flying aircraft
///
/// Polls a flight-tracking feed for a bounding box, flags aircraft flying
/// below the configured ceiling and stores every batch in log files, the log
/// output or a local database.
#[derive(Debug, Parser)]
#[command(name = "flighttracker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline in the foreground until Ctrl-C
    Start(StartCommand),

    /// Serve the HTTP control surface (start/stop/search/status)
    Serve(ServeCommand),

    /// Query the flight database and print matches as JSON
    Search(SearchCommand),

    /// View or create configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}
