//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::process;

use skylayer::config::ConfigFileError;
use skylayer::fetch::FetchError;
use skylayer::traverse::TraverseError;
use skylayer::worker::WorkerError;
use thiserror::Error;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),

    /// Failed to create the HTTP fetcher
    #[error("Failed to create fetcher: {0}")]
    Fetcher(#[from] FetchError),

    /// Failed to start the decode workers
    #[error("Failed to start decode workers: {0}")]
    Workers(#[from] WorkerError),

    /// The survey manifest could not be loaded
    #[error("Survey '{url}' could not be loaded")]
    SurveyUnavailable { url: String },

    /// Something did not settle in time
    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    /// The requested tile could not be produced
    #[error("Tile {tile}: {reason}")]
    Tile { tile: String, reason: String },

    /// Invalid command-line argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to write output file
    #[error("Failed to write file '{path}': {error}")]
    FileWrite {
        path: String,
        #[source]
        error: image::ImageError,
    },

    /// Traversal could not complete
    #[error("Traversal failed: {0}")]
    Traverse(#[from] TraverseError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::SurveyUnavailable { .. } => {
                eprintln!();
                eprintln!("Check that:");
                eprintln!("  1. The URL points at the survey root (the directory holding 'properties')");
                eprintln!("  2. The server is reachable from this machine");
                eprintln!("See the log file for the HTTP status.");
            }
            CliError::Traverse(TraverseError::QueueOverflow { .. }) => {
                eprintln!();
                eprintln!("Use a smaller --depth or a larger --capacity.");
            }
            _ => {}
        }

        process::exit(1)
    }
}
