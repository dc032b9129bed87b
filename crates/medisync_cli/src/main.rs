//! MediSync CLI
//!
//! Command-line tools for a MediSync data directory.
//!
//! # Commands
//!
//! - `status` - Show records waiting to be pushed
//! - `sync` - Run one synchronization session
//! - `watch` - Sync whenever the remote becomes reachable
//! - `probe` - Check whether the remote is reachable
//! - `discard` - Drop local changes that were never synced

mod commands;

use clap::{Parser, Subcommand};
use commands::Target;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// MediSync offline-first sync tools.
#[derive(Parser)]
#[command(name = "medisync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local data directory
    #[arg(global = true, short, long, env = "MEDISYNC_DATA_DIR", default_value = "medisync-data")]
    data_dir: PathBuf,

    /// Base URL of the REST API
    #[arg(global = true, short, long, env = "MEDISYNC_URL", default_value = "http://localhost:8080/api")]
    url: String,

    /// Bearer token for the REST API
    #[arg(global = true, long, env = "MEDISYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// host:port to probe instead of the API host
    #[arg(global = true, long)]
    probe_address: Option<String>,

    /// Seconds between reachability probes
    #[arg(global = true, long, default_value = "5")]
    probe_interval: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show records waiting to be pushed
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run one synchronization session
    Sync {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Sync whenever the remote becomes reachable, until interrupted
    Watch,

    /// Check whether the remote is reachable
    Probe,

    /// Drop local changes that were never synced
    Discard {
        /// Entity type to discard (patients, diagnoses, ...)
        #[arg(short, long)]
        entity: Option<String>,

        /// Discard every entity type
        #[arg(short, long)]
        all: bool,
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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let target = Target {
        data_dir: cli.data_dir,
        url: cli.url,
        token: cli.token,
        probe_address: cli.probe_address,
        probe_interval: std::time::Duration::from_secs(cli.probe_interval.max(1)),
    };

    match cli.command {
        Commands::Status { format } => {
            commands::status::run(&target, &format)?;
        }
        Commands::Sync { format } => {
            commands::sync::run(&target, &format).await?;
        }
        Commands::Watch => {
            commands::watch::run(&target).await?;
        }
        Commands::Probe => {
            commands::probe::run(&target).await?;
        }
        Commands::Discard { entity, all } => {
            commands::discard::run(&target, entity.as_deref(), all)?;
        }
        Commands::Version => {
            println!("MediSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
