//! Filehistory - local file history with retention.
//!
//! This is the main entry point for the filehistory CLI.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::*;
use config::FileConfig;
use filehistory_snapshot::FileHistory;
use filehistory_util::path::absolutize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "filehistory")]
#[command(author, version, about = "Local file history with retention", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Snapshot store directory (overrides configuration)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Workspace root used for configuration, exclusions and display paths
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the current content of files
    Capture {
        /// Files to capture
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Watch a directory and capture files as they change
    Watch {
        /// Directory to watch (defaults to the workspace)
        dir: Option<PathBuf>,
    },
    /// Show the history of one file
    Log {
        /// File to inspect
        path: PathBuf,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all history grouped by recency
    List {
        /// Only show files whose path contains this text
        #[arg(short, long)]
        filter: Option<String>,
        /// Group by calendar day instead of recency window
        #[arg(long)]
        by_day: bool,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the content of a snapshot
    Show {
        path: PathBuf,
        #[command(flatten)]
        selector: SelectorArgs,
    },
    /// Diff a snapshot against the current file
    Diff {
        path: PathBuf,
        #[command(flatten)]
        selector: SelectorArgs,
    },
    /// Restore a snapshot
    Restore {
        path: PathBuf,
        #[command(flatten)]
        selector: SelectorArgs,
        /// Write to this path instead of the original file
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Apply retention limits to the whole store
    Prune,
    /// Delete history of one file, or everything
    Purge {
        /// File whose history to delete (all history if omitted)
        path: Option<PathBuf>,
    },
    /// Check the store for inconsistent history directories
    Verify {
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show store statistics
    Stats {
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let watching = matches!(cli.command, Commands::Watch { .. });
    let log_file = init_logging(cli.verbose, watching);

    let cwd = std::env::current_dir()?;
    let workspace = cli
        .workspace
        .as_deref()
        .map(|w| absolutize(w, &cwd))
        .unwrap_or_else(|| cwd.clone());

    let (mut layers, sources) = FileConfig::load(Some(&workspace)).await;
    if let Some(store) = &cli.store {
        layers.store_root = Some(absolutize(store, &cwd));
    }
    let config = layers.resolve(&workspace);

    let history = FileHistory::open(config, Some(workspace.clone())).await?;

    let result = match cli.command {
        Commands::Capture { paths } => handle_capture(&history, paths).await,
        Commands::Watch { dir } => {
            let dir = dir.map(|d| absolutize(&d, &cwd)).unwrap_or(workspace);
            handle_watch(history, &dir).await
        }
        Commands::Log { path, json } => handle_log(&history, &path, json).await,
        Commands::List {
            filter,
            by_day,
            json,
        } => handle_list(&history, filter.as_deref(), by_day, json).await,
        Commands::Show { path, selector } => handle_show(&history, &path, &selector).await,
        Commands::Diff { path, selector } => handle_diff(&history, &path, &selector).await,
        Commands::Restore { path, selector, to } => {
            handle_restore(&history, &path, &selector, to).await
        }
        Commands::Prune => handle_prune(&history).await,
        Commands::Purge { path } => handle_purge(&history, path.as_deref()).await,
        Commands::Verify { json } => handle_verify(&history, json).await,
        Commands::Stats { json } => handle_stats(&history, json).await,
        Commands::Config => show_config(history.config(), &sources),
    };

    if let Some(path) = log_file {
        eprintln!("Logs: {}", path.display());
    }

    result
}
