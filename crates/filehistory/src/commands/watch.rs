//! Watch a directory and capture files as they change.

use filehistory_snapshot::{CaptureOutcome, FileHistory};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Run until interrupted, routing every create/modify event through the
/// change gate.
pub async fn handle_watch(history: FileHistory, dir: &Path) -> anyhow::Result<()> {
    let history = Arc::new(history);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // The receiver only goes away on shutdown
            let _ = tx.send(res);
        },
        Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::Recursive)?;

    info!(dir = %dir.display(), store = %history.store().root().display(), "Watching for changes");
    println!("Watching {} (Ctrl+C to stop)", dir.display());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping watcher");
                break;
            }
            event = rx.recv() => match event {
                Some(Ok(event)) => dispatch(&history, event),
                Some(Err(e)) => warn!(error = %e, "File watcher error"),
                None => break,
            },
        }
    }

    Ok(())
}

/// Spawn one capture task per changed path.
fn dispatch(history: &Arc<FileHistory>, event: Event) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }

    for path in event.paths {
        let history = Arc::clone(history);
        tokio::spawn(async move {
            let source = path.display().to_string();
            match history.notify_changed(&path, &source).await {
                CaptureOutcome::Captured(snapshot) => info!(
                    path = %history.display_path(&snapshot),
                    timestamp = %snapshot.timestamp,
                    "Captured change"
                ),
                CaptureOutcome::Skipped(reason) => {
                    debug!(path = %path.display(), %reason, "Change skipped")
                }
                // Logged by the history itself
                CaptureOutcome::Failed(_) => {}
            }
        });
    }
}
