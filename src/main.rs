mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use strata::config::StrataConfig;

#[derive(Parser)]
#[command(name = "strata", version, about = "Log-structured item store with similarity search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show collection and log statistics
    Stats,
    /// Print one item in full
    Inspect {
        /// Item key
        key: String,
    },
    /// Merge a JSON patch into an item (created if missing)
    Set {
        /// Item key
        key: String,
        /// JSON object to merge into the item's data
        data: String,
    },
    /// Delete an item (writes a tombstone)
    Delete {
        /// Item key
        key: String,
    },
    /// Rank items related to the given item by embedding similarity
    Related {
        /// Source item key
        key: String,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Skip the adaptive deviation cutoff
        #[arg(long)]
        no_trim: bool,
    },
    /// Compact the log to a single snapshot
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = StrataConfig::load()?;

    // Initialize tracing with the configured log level.
    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Stats => cli::stats::run(&config)?,
        Command::Inspect { key } => cli::inspect::run(&config, &key)?,
        Command::Set { key, data } => cli::edit::set(&config, &key, &data)?,
        Command::Delete { key } => cli::edit::delete(&config, &key)?,
        Command::Related {
            key,
            limit,
            no_trim,
        } => cli::related::run(&config, &key, limit, no_trim)?,
        Command::Compact => cli::compact::run(&config)?,
    }

    Ok(())
}
