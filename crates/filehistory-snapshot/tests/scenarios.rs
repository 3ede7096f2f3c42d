//! End-to-end history scenarios against a real store directory.

use chrono::{Duration, Local};
use filehistory_snapshot::{
    CaptureOutcome, FileHistory, HistoryConfig, RetentionPolicy, SkipReason, SnapshotStore,
    StorageKey, Timestamp,
};
use std::collections::HashSet;
use std::fs;
use std::time::Instant;
use tempfile::TempDir;

fn config_in(temp: &TempDir) -> HistoryConfig {
    HistoryConfig {
        store_root: Some(temp.path().join("store")),
        ..HistoryConfig::default()
    }
}

/// Three captures at distinct seconds with a count limit of two.
#[tokio::test]
async fn test_count_limit_evicts_oldest_from_disk() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let store = SnapshotStore::open(temp.path().join("store"), RetentionPolicy::new(2, 0))
        .await
        .expect("Failed to open store");
    let file = temp.path().join("b.txt");

    let base = Local::now().naive_local();
    let mut captured = Vec::new();
    for (i, secs) in [3, 2, 1].into_iter().enumerate() {
        fs::write(&file, format!("version {i}")).expect("Failed to write file");
        let at = Timestamp::from_naive(base - Duration::seconds(secs));
        captured.push(store.capture_at(&file, at).await.expect("Capture failed"));
    }

    let entries = store.entries_for(&file).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].timestamp, captured[2].timestamp);
    assert_eq!(entries[1].timestamp, captured[1].timestamp);
    assert!(!captured[0].content_path.exists());
    assert!(!captured[0].meta_path.exists());

    let newest = store.read_content(&entries[0]).await.expect("Read failed");
    assert_eq!(newest, b"version 2");
}

/// The on-disk layout is `<root>/<key>/<timestamp>_<basename>[.meta]`.
#[tokio::test]
async fn test_on_disk_layout() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let history = FileHistory::open(config_in(&temp), None)
        .await
        .expect("Failed to open history");
    let file = temp.path().join("notes.md");
    fs::write(&file, "# notes").expect("Failed to write file");

    let snapshot = history.capture(&file).await.expect("Capture failed");

    let key = StorageKey::for_path(&file);
    let dir = temp.path().join("store").join(key.as_str());
    let names: HashSet<String> = fs::read_dir(&dir)
        .expect("Key directory missing")
        .map(|e| e.expect("Bad entry").file_name().to_string_lossy().into_owned())
        .collect();

    let blob = format!("{}_notes.md", snapshot.timestamp);
    let meta = format!("{blob}.meta");
    assert_eq!(names, HashSet::from([blob, meta.clone()]));
    assert_eq!(
        fs::read_to_string(dir.join(meta)).expect("Sidecar missing"),
        file.to_string_lossy()
    );
}

/// A burst of notifications yields one capture; excluded paths yield none.
#[tokio::test]
async fn test_notifications_are_gated() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let workspace = temp.path().join("proj");
    fs::create_dir_all(workspace.join("node_modules")).expect("Failed to create dirs");
    let history = FileHistory::open(config_in(&temp), Some(workspace.clone()))
        .await
        .expect("Failed to open history");

    let ignored = workspace.join("node_modules/x.js");
    fs::write(&ignored, "module.exports = 1").expect("Failed to write file");
    let outcome = history.notify_changed(&ignored, "watcher").await;
    assert!(matches!(outcome, CaptureOutcome::Skipped(SkipReason::Excluded)));

    let tracked = workspace.join("main.js");
    fs::write(&tracked, "console.log(1)").expect("Failed to write file");
    let t0 = Instant::now();
    let captures = [0, 200, 400, 800]
        .into_iter()
        .map(|ms| t0 + std::time::Duration::from_millis(ms));
    let mut captured = 0;
    for at in captures {
        if history.notify_changed_at(&tracked, "watcher", at).await.is_captured() {
            captured += 1;
        }
    }
    assert_eq!(captured, 1);

    let groups = history.list_all(None).await;
    let listed: Vec<String> = groups
        .iter()
        .flat_map(|g| g.entries.iter())
        .map(|s| history.display_path(s))
        .collect();
    assert_eq!(listed, vec!["main.js".to_string()]);
}

/// Orphaned halves of a pair never show up and never raise.
#[tokio::test]
async fn test_corrupt_pairs_are_invisible() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let history = FileHistory::open(config_in(&temp), None)
        .await
        .expect("Failed to open history");
    let file = temp.path().join("a.txt");
    fs::write(&file, "a").expect("Failed to write file");
    let snapshot = history.capture(&file).await.expect("Capture failed");

    let dir = temp.path().join("store").join(snapshot.storage_key.as_str());
    fs::write(dir.join("2020-01-01_00-00-00_a.txt"), "blob only").expect("write");
    fs::write(dir.join("2020-01-02_00-00-00_a.txt.meta"), file.to_string_lossy().as_bytes())
        .expect("write");

    assert_eq!(history.list_for(&file).await, vec![snapshot.clone()]);
    let all: Vec<_> = history
        .list_all(None)
        .await
        .into_iter()
        .flat_map(|g| g.entries)
        .collect();
    assert_eq!(all, vec![snapshot]);
}
