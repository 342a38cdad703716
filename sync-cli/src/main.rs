//! # tasksync
//!
//! CLI tool for inspecting tasksync event files and client configuration.
//!
//! ## Commands
//!
//! - `apply`: Apply an event file to an empty task list and print the tasks
//! - `merge`: Coalesce an event file the way the outbound queue does
//! - `config`: Print the effective client configuration
//!
//! ## Example
//!
//! ```bash
//! # Replay a history dump
//! tasksync apply events.json
//!
//! # See what a client would publish for these local edits
//! tasksync merge local-edits.json
//!
//! # Show the configuration with defaults filled in
//! tasksync config tasksync.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{apply, config, merge};

/// CLI tool for inspecting tasksync event files and configuration.
#[derive(Parser, Debug)]
#[command(name = "tasksync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a JSON array of events to an empty task list
    Apply {
        /// Event file
        file: PathBuf,
    },

    /// Coalesce a JSON array of events into a publication queue
    Merge {
        /// Event file
        file: PathBuf,
    },

    /// Print the effective client configuration
    Config {
        /// TOML config file (defaults are printed if omitted)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Apply { file } => {
            apply::run(&file).await?;
        }
        Commands::Merge { file } => {
            merge::run(&file).await?;
        }
        Commands::Config { path } => {
            config::run(path.as_deref()).await?;
        }
    }

    Ok(())
}
