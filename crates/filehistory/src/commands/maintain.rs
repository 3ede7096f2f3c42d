//! Commands that change or inspect the store as a whole.

use super::{format_size, SelectorArgs};
use crate::config::ConfigSource;
use filehistory_snapshot::{FileHistory, HistoryConfig};
use std::path::{Path, PathBuf};

/// Write a snapshot back to disk.
pub async fn handle_restore(
    history: &FileHistory,
    path: &Path,
    selector: &SelectorArgs,
    to: Option<PathBuf>,
) -> anyhow::Result<()> {
    let snapshot = history.find(path, selector.selector()?).await?;
    let target = history.restore(&snapshot, to.as_deref()).await?;
    println!("Restored {} to {}", snapshot.timestamp, target.display());
    Ok(())
}

/// Apply retention to every tracked file.
pub async fn handle_prune(history: &FileHistory) -> anyhow::Result<()> {
    let removed = history.prune_all().await;
    println!("Pruned {removed} snapshots");
    Ok(())
}

/// Delete the history of one file, or all history.
pub async fn handle_purge(history: &FileHistory, path: Option<&Path>) -> anyhow::Result<()> {
    let removed = history.purge(path).await?;
    match path {
        Some(path) => println!("Purged {removed} snapshots of {}", path.display()),
        None => println!("Purged {removed} snapshots"),
    }
    Ok(())
}

/// Check that every history directory is consistent.
pub async fn handle_verify(history: &FileHistory, json: bool) -> anyhow::Result<()> {
    let report = history.verify().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for issue in &report.issues {
            println!("{}: {}", issue.key, issue.message);
        }
        println!(
            "Checked {} directories, {} problems",
            report.checked,
            report.issues.len()
        );
    }

    if !report.is_clean() {
        anyhow::bail!("{} history directories failed verification", report.issues.len());
    }
    Ok(())
}

/// Print store statistics.
pub async fn handle_stats(history: &FileHistory, json: bool) -> anyhow::Result<()> {
    let stats = history.stats().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Store:     {}", history.store().root().display());
    println!("Files:     {}", stats.files);
    println!("Snapshots: {}", stats.snapshots);
    println!("Size:      {}", format_size(stats.bytes));
    Ok(())
}

/// Print the effective configuration and where it came from.
pub fn show_config(config: &HistoryConfig, sources: &[ConfigSource]) -> anyhow::Result<()> {
    println!("Configuration sources:");
    if sources.is_empty() {
        println!("  (none)");
    } else {
        for source in sources {
            println!("  {source}");
        }
    }
    println!();

    println!("Store root: {}", config.resolved_store_root().display());
    println!();

    println!("Current configuration:");
    println!("{}", serde_json::to_string_pretty(config)?);

    Ok(())
}
