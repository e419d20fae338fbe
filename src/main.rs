mod api_client;
mod cli;
mod config;
mod describe;
mod embed;
mod error;
mod normalize;
mod pipeline;
mod server;
mod supabase;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "furnivec",
    version,
    about = "Furniture vector sandbox — catalog, embed, and search furniture images"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve,
    /// Ingest a single image file or every image in a directory
    Ingest {
        /// Image file or directory of images
        path: PathBuf,
        /// Explicit item name (single-file runs only; defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Upload normalized 200x200 previews for directory batches
        #[arg(long)]
        previews: bool,
        /// Delay between batch items in milliseconds
        #[arg(long)]
        pace_ms: Option<u64>,
    },
    /// Find stored items similar to a query image
    Search {
        /// Query image file
        image: PathBuf,
        /// Maximum number of matches to return
        #[arg(long, default_value_t = 3)]
        limit: u32,
        /// Minimum similarity threshold
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::FurnivecConfig::load()?;

    // Initialize tracing with the configured log level, logging to stderr so
    // stdout stays clean for CLI output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve(config).await?;
        }
        Command::Ingest {
            path,
            name,
            previews,
            pace_ms,
        } => {
            cli::ingest::ingest(&config, &path, name.as_deref(), previews, pace_ms).await?;
        }
        Command::Search {
            image,
            limit,
            threshold,
        } => {
            cli::search::search(&config, &image, limit, threshold).await?;
        }
    }

    Ok(())
}
