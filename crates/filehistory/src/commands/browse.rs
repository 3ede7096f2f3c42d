//! Read-only commands: log, list, show and diff.

use super::{format_size, SelectorArgs};
use filehistory_snapshot::{FileHistory, Snapshot};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One snapshot as printed by `--json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotView<'a> {
    display_path: String,
    #[serde(flatten)]
    snapshot: &'a Snapshot,
}

/// A labeled group of snapshots as printed by `--json`.
#[derive(Serialize)]
struct GroupView<'a> {
    label: String,
    entries: Vec<SnapshotView<'a>>,
}

fn view<'a>(history: &FileHistory, snapshot: &'a Snapshot) -> SnapshotView<'a> {
    SnapshotView {
        display_path: history.display_path(snapshot),
        snapshot,
    }
}

/// Print the history of one file.
pub async fn handle_log(history: &FileHistory, path: &Path, json: bool) -> anyhow::Result<()> {
    let entries = history.list_for(path).await;

    if json {
        let views: Vec<_> = entries.iter().map(|s| view(history, s)).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No history for {}", path.display());
        return Ok(());
    }

    println!("History of {}:", history.display_path(&entries[0]));
    println!();
    println!("{:<6} {:<20} {:>10}", "INDEX", "TIMESTAMP", "SIZE");
    println!("{}", "-".repeat(38));
    for (index, snapshot) in entries.iter().enumerate() {
        let size = std::fs::metadata(&snapshot.content_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "?".to_string());
        println!("{:<6} {:<20} {:>10}", index, snapshot.timestamp.to_string(), size);
    }

    Ok(())
}

/// Print every tracked snapshot, grouped by recency window or by day.
pub async fn handle_list(
    history: &FileHistory,
    filter: Option<&str>,
    by_day: bool,
    json: bool,
) -> anyhow::Result<()> {
    let groups: Vec<(String, Vec<Snapshot>)> = if by_day {
        history
            .list_all_by_day(filter)
            .await
            .into_iter()
            .map(|g| (g.label, g.entries))
            .collect()
    } else {
        history
            .list_all(filter)
            .await
            .into_iter()
            .map(|g| (g.label(), g.entries))
            .collect()
    };

    if json {
        let views: Vec<_> = groups
            .iter()
            .map(|(label, entries)| GroupView {
                label: label.clone(),
                entries: entries.iter().map(|s| view(history, s)).collect(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No history found.");
        return Ok(());
    }

    for (label, entries) in &groups {
        println!("{label}:");
        for snapshot in entries {
            println!(
                "  {}  {}",
                snapshot.timestamp,
                history.display_path(snapshot)
            );
        }
        println!();
    }

    Ok(())
}

/// Write the raw content of one snapshot to stdout.
pub async fn handle_show(
    history: &FileHistory,
    path: &Path,
    selector: &SelectorArgs,
) -> anyhow::Result<()> {
    let snapshot = history.find(path, selector.selector()?).await?;
    let content = history.read_content(&snapshot).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;
    Ok(())
}

/// Print a unified diff from one snapshot to the current file.
pub async fn handle_diff(
    history: &FileHistory,
    path: &Path,
    selector: &SelectorArgs,
) -> anyhow::Result<()> {
    let snapshot = history.find(path, selector.selector()?).await?;
    let diff = history.diff(&snapshot).await?;

    if diff.is_empty() {
        println!("No changes since {}", snapshot.timestamp);
    } else {
        print!("{diff}");
    }
    Ok(())
}
