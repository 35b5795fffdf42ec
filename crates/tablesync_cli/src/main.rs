//! tablesync CLI
//!
//! Command-line tools for pulling tables into a local file store.
//!
//! # Commands
//!
//! - `pull` - Pull a table from a JSON dump of the remote into the store
//! - `checkpoints` - List or reset stored pull checkpoints

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tablesync command-line tools.
#[derive(Parser)]
#[command(name = "tablesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local store directory
    #[arg(global = true, short, long)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull a table into the local store
    Pull {
        /// JSON file holding the remote rows
        #[arg(short, long)]
        remote: PathBuf,

        /// Table to pull
        #[arg(short, long)]
        table: String,

        /// Identity of an incremental pull (omit for a one-shot pull)
        #[arg(short, long)]
        query_id: Option<String>,

        /// Rows per page
        #[arg(long)]
        page_size: Option<u32>,

        /// Largest page the remote answers with
        #[arg(long)]
        server_page_size: Option<u32>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List stored pull checkpoints
    Checkpoints {
        /// Delete the checkpoint of this identity
        #[arg(long)]
        reset: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Pull {
            remote,
            table,
            query_id,
            page_size,
            server_page_size,
            format,
        } => {
            let store = cli.store.ok_or("Store path required for pull")?;
            let options = commands::pull::PullOptions {
                remote,
                table,
                query_id,
                page_size,
                server_page_size,
            };
            commands::pull::run(&store, options, &format).await?;
        }
        Commands::Checkpoints { reset, format } => {
            let store = cli.store.ok_or("Store path required for checkpoints")?;
            commands::checkpoints::run(&store, reset.as_deref(), &format).await?;
        }
        Commands::Version => {
            println!("tablesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
