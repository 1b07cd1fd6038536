//! tuneid CLI - Song identification from the command line
//!
//! Features:
//! - Ingest WAV files into a JSON fingerprint database
//! - Search clips against the database
//! - Per-song match counters
//! - Effective configuration dump

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::Context;

/// tuneid - Acoustic fingerprinting toolkit
#[derive(Parser)]
#[command(name = "tuneid")]
#[command(version)]
#[command(about = "Identify songs from short audio clips", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Fingerprint database file
    #[arg(long, global = true, default_value = "tuneid-db.json")]
    db: PathBuf,

    /// Match counter file
    #[arg(long, global = true, default_value = "tuneid-counts.json")]
    counter: PathBuf,

    /// Recognizer configuration (JSON); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprint a WAV file and add it to the database
    Ingest {
        /// WAV file at the configured sample rate
        input: PathBuf,

        /// Song id to store (defaults to the file stem)
        #[arg(short, long)]
        song_id: Option<String>,
    },

    /// Identify a WAV clip against the database
    Search {
        /// WAV file at the configured sample rate
        input: PathBuf,
    },

    /// Show how many times a song has been matched
    Count {
        /// Song id
        song_id: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::load(cli.config.as_deref(), cli.db, cli.counter, cli.json)?;

    match cli.command {
        Commands::Ingest { input, song_id } => {
            commands::ingest(&ctx, &input, song_id).await?;
        }
        Commands::Search { input } => {
            commands::search(&ctx, &input).await?;
        }
        Commands::Count { song_id } => {
            commands::count(&ctx, &song_id).await?;
        }
        Commands::Config => {
            commands::show_config(&ctx)?;
        }
    }

    Ok(())
}
