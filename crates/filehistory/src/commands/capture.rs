//! Explicit capture of one or more files.

use filehistory_snapshot::FileHistory;
use std::path::PathBuf;

/// Capture every path given on the command line.
///
/// Failures are reported per file; the command fails if any capture did.
pub async fn handle_capture(history: &FileHistory, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let total = paths.len();
    let mut failed = 0;

    for path in paths {
        match history.capture(&path).await {
            Ok(snapshot) => println!(
                "Captured {} at {}",
                history.display_path(&snapshot),
                snapshot.timestamp
            ),
            Err(e) => {
                eprintln!("Failed to capture {}: {e}", path.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} captures failed");
    }
    Ok(())
}
