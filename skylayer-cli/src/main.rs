//! SkyLayer CLI - Command-line interface
//!
//! Inspect HiPS surveys and exercise the tile engine against a live server.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use skylayer::logging::{default_log_dir, default_log_file, init_logging};

use commands::config::ConfigCommands;
use commands::probe::ProbeArgs;
use commands::tile::TileArgs;
use commands::traverse::TraverseArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "skylayer")]
#[command(version, about = "Progressive tile engine for HiPS sky surveys", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a survey manifest and mosaic and print its metadata
    Probe(ProbeArgs),

    /// Fetch and decode a single tile
    Tile(TileArgs),

    /// Count the nodes of a breadth-first walk to a fixed depth
    Traverse(TraverseArgs),

    /// View or initialize the configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

fn main() {
    let cli = Cli::parse();

    let logging_guard = match init_logging(default_log_dir(), default_log_file()) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let result = match cli.command {
        Commands::Probe(args) => commands::probe::run(args),
        Commands::Tile(args) => commands::tile::run(args),
        Commands::Traverse(args) => commands::traverse::run(args),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        // Flush the log file before exiting.
        drop(logging_guard);
        e.exit();
    }
}
