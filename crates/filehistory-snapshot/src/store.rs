//! Snapshot storage implementation.

use crate::snapshot::{parse_blob_name, sidecar_path, META_EXTENSION};
use crate::{HistoryError, HistoryResult, RetentionPolicy, Snapshot, StorageKey, Timestamp};
use chrono::Local;
use filehistory_util::TimingGuard;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Which snapshot of a file to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSelector {
    /// The most recent capture.
    Latest,
    /// Position in the newest-first history, `0` being the latest.
    Index(usize),
    /// The capture taken at this exact second.
    At(Timestamp),
}

/// Aggregate numbers about the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Storage-key directories, one per tracked file.
    pub files: usize,
    /// Complete content/sidecar pairs.
    pub snapshots: usize,
    /// Bytes held by content blobs.
    pub bytes: u64,
}

/// A content blob that has a matching sidecar.
#[derive(Debug)]
struct BlobPair {
    timestamp: Timestamp,
    content_path: PathBuf,
    meta_path: PathBuf,
}

/// Storage for file snapshots.
///
/// Every tracked file owns one directory, named by the storage key of its
/// absolute path:
/// ```text
/// root/
///   <storage_key>/
///     <timestamp>_<basename>        # immutable content blob
///     <timestamp>_<basename>.meta   # one line: absolute original path
/// ```
#[derive(Debug)]
pub struct SnapshotStore {
    root: PathBuf,
    retention: RetentionPolicy,
}

impl SnapshotStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// Failing to create the root is the only fatal error of the store.
    pub async fn open(root: impl Into<PathBuf>, retention: RetentionPolicy) -> HistoryResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| HistoryError::StoreUnavailable {
                path: root.clone(),
                source,
            })?;

        debug!(root = %root.display(), "Opened snapshot store");
        Ok(Self { root, retention })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Retention applied after each capture.
    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Directory holding the history for `key`.
    pub fn key_dir(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Resolve relative paths against the process working directory.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        filehistory_util::path::absolutize(path, &cwd)
    }

    /// Capture the current content of `path`.
    pub async fn capture(&self, path: &Path) -> HistoryResult<Snapshot> {
        self.capture_at(path, Timestamp::now()).await
    }

    /// Capture the current content of `path`, stamped with `timestamp`.
    ///
    /// The content blob is written before its sidecar, so an interrupted
    /// capture leaves at most an orphan blob that listings skip. Retention
    /// runs afterwards, best-effort.
    pub async fn capture_at(&self, path: &Path, timestamp: Timestamp) -> HistoryResult<Snapshot> {
        let path = self.absolute(path);

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| HistoryError::from_io(e, &path))?;
        if !metadata.is_file() {
            return Err(HistoryError::not_found(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| HistoryError::not_found(path.display().to_string()))?;

        let key = StorageKey::for_path(&path);
        let key_dir = self.key_dir(&key);
        fs::create_dir_all(&key_dir)
            .await
            .map_err(|e| HistoryError::from_io(e, &key_dir))?;

        let content = fs::read(&path)
            .await
            .map_err(|e| HistoryError::from_io(e, &path))?;

        let snapshot = Snapshot::locate(path.clone(), key, timestamp, &key_dir, &basename);
        write_atomic(&snapshot.content_path, &content).await?;
        write_atomic(&snapshot.meta_path, path.as_os_str().as_encoded_bytes()).await?;

        info!(
            path = %path.display(),
            timestamp = %snapshot.timestamp,
            bytes = content.len(),
            "Captured snapshot"
        );

        self.retention
            .prune_key(self, &snapshot.storage_key, &path, Local::now())
            .await;

        Ok(snapshot)
    }

    /// History of `path`, newest first. Corrupt entries are skipped.
    pub async fn entries_for(&self, path: &Path) -> Vec<Snapshot> {
        let path = self.absolute(path);
        let key = StorageKey::for_path(&path);
        self.entries_for_key(&key, &path).await
    }

    /// History stored under `key`, attributed to `original`, newest first.
    pub async fn entries_for_key(&self, key: &StorageKey, original: &Path) -> Vec<Snapshot> {
        let mut entries: Vec<Snapshot> = self
            .blob_pairs(key)
            .await
            .into_iter()
            .map(|pair| Snapshot {
                original_path: original.to_path_buf(),
                storage_key: key.clone(),
                timestamp: pair.timestamp,
                content_path: pair.content_path,
                meta_path: pair.meta_path,
            })
            .collect();

        entries.sort_by(Snapshot::newest_first);
        entries
    }

    /// Every snapshot whose original file still exists, newest first.
    ///
    /// Each entry is attributed through its own sidecar. Ties on timestamp
    /// are broken by original path.
    pub async fn all_entries(&self) -> Vec<Snapshot> {
        let _timing = TimingGuard::store("all_entries");
        let mut entries = Vec::new();
        let mut exists: HashMap<PathBuf, bool> = HashMap::new();

        for key in self.keys().await {
            for pair in self.blob_pairs(&key).await {
                let original = match read_sidecar(&pair.meta_path).await {
                    Ok(original) => original,
                    Err(e) => {
                        debug!(
                            path = %pair.meta_path.display(),
                            error = %e,
                            "Skipping snapshot with unreadable sidecar"
                        );
                        continue;
                    }
                };

                let alive = match exists.get(&original) {
                    Some(alive) => *alive,
                    None => {
                        let alive = fs::try_exists(&original).await.unwrap_or(false);
                        exists.insert(original.clone(), alive);
                        alive
                    }
                };
                if !alive {
                    continue;
                }

                entries.push(Snapshot {
                    original_path: original,
                    storage_key: key.clone(),
                    timestamp: pair.timestamp,
                    content_path: pair.content_path,
                    meta_path: pair.meta_path,
                });
            }
        }

        entries.sort_by(Snapshot::newest_first);
        entries
    }

    /// Storage keys present in the store. Foreign entries are ignored.
    pub async fn keys(&self) -> Vec<StorageKey> {
        let mut keys = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Failed to list snapshot store");
                return keys;
            }
        };

        loop {
            match dir.next_entry().await {
                Ok(Some(entry)) => {
                    let Some(key) = entry.file_name().to_str().and_then(StorageKey::parse) else {
                        continue;
                    };
                    if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                        keys.push(key);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Snapshot store listing interrupted");
                    break;
                }
            }
        }

        keys.sort();
        keys
    }

    /// Original path recorded by the first readable sidecar under `key`.
    pub async fn resolve_original(&self, key: &StorageKey) -> Option<PathBuf> {
        for pair in self.blob_pairs(key).await {
            match read_sidecar(&pair.meta_path).await {
                Ok(path) => return Some(path),
                Err(e) => debug!(path = %pair.meta_path.display(), error = %e, "Unreadable sidecar"),
            }
        }
        None
    }

    /// Check that every sidecar under `key` records the same path, and that
    /// the path hashes back to `key`.
    ///
    /// Returns the recorded path, or `None` for an empty directory.
    pub async fn verify_key(&self, key: &StorageKey) -> HistoryResult<Option<PathBuf>> {
        let mut recorded: Option<PathBuf> = None;

        for pair in self.blob_pairs(key).await {
            let path = read_sidecar(&pair.meta_path).await?;
            match &recorded {
                Some(first) if *first != path => {
                    return Err(HistoryError::corrupt(format!(
                        "{} records {} and {}",
                        key,
                        first.display(),
                        path.display()
                    )));
                }
                Some(_) => {}
                None => recorded = Some(path),
            }
        }

        if let Some(path) = &recorded {
            let expected = StorageKey::for_path(path);
            if expected != *key {
                return Err(HistoryError::corrupt(format!(
                    "{} is stored under {} but hashes to {}",
                    path.display(),
                    key,
                    expected
                )));
            }
        }

        Ok(recorded)
    }

    /// Raw content of a snapshot.
    pub async fn read_content(&self, snapshot: &Snapshot) -> HistoryResult<Vec<u8>> {
        fs::read(&snapshot.content_path)
            .await
            .map_err(|e| HistoryError::from_io(e, &snapshot.content_path))
    }

    /// Pick one snapshot from the history of `path`.
    pub async fn find(&self, path: &Path, selector: SnapshotSelector) -> HistoryResult<Snapshot> {
        let entries = self.entries_for(path).await;
        let found = match selector {
            SnapshotSelector::Latest => entries.into_iter().next(),
            SnapshotSelector::Index(index) => entries.into_iter().nth(index),
            SnapshotSelector::At(timestamp) => {
                entries.into_iter().find(|s| s.timestamp == timestamp)
            }
        };

        found.ok_or_else(|| {
            HistoryError::not_found(format!("snapshot of {} ({:?})", path.display(), selector))
        })
    }

    /// Delete one snapshot: content blob, then sidecar.
    ///
    /// Files that are already gone are not an error.
    pub async fn delete(&self, snapshot: &Snapshot) -> HistoryResult<()> {
        let content = remove_if_present(&snapshot.content_path).await;
        let meta = remove_if_present(&snapshot.meta_path).await;
        content.and(meta)
    }

    /// Remove the directory for `key` if nothing is left in it.
    pub async fn remove_key_dir_if_empty(&self, key: &StorageKey) {
        let dir = self.key_dir(key);
        if fs::remove_dir(&dir).await.is_ok() {
            debug!(dir = %dir.display(), "Removed empty history directory");
        }
    }

    /// Delete the history of `path`, or of every file when `path` is `None`.
    ///
    /// Returns the number of snapshots removed.
    pub async fn purge(&self, path: Option<&Path>) -> HistoryResult<usize> {
        let _timing = TimingGuard::store("purge");

        let keys = match path {
            Some(path) => vec![StorageKey::for_path(&self.absolute(path))],
            None => self.keys().await,
        };

        let mut removed = 0;
        let mut first_error = None;
        for key in keys {
            let count = self.blob_pairs(&key).await.len();
            let dir = self.key_dir(&key);
            match fs::remove_dir_all(&dir).await {
                Ok(()) => removed += count,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to purge history");
                    if first_error.is_none() {
                        first_error = Some(HistoryError::from_io(e, &dir));
                    }
                }
            }
        }

        info!("Purged {} snapshots", removed);
        // A single-file purge reports its failure; a full purge keeps going.
        match (path, first_error) {
            (Some(_), Some(e)) => Err(e),
            _ => Ok(removed),
        }
    }

    /// Write a snapshot's content to `target`, or back to its original path.
    pub async fn restore(&self, snapshot: &Snapshot, target: Option<&Path>) -> HistoryResult<PathBuf> {
        let content = self.read_content(snapshot).await?;
        self.write_restored(snapshot, &content, target).await
    }

    /// Write already-read snapshot `content` to `target`, or back to the
    /// snapshot's original path.
    pub(crate) async fn write_restored(
        &self,
        snapshot: &Snapshot,
        content: &[u8],
        target: Option<&Path>,
    ) -> HistoryResult<PathBuf> {
        let target = target
            .map(|t| self.absolute(t))
            .unwrap_or_else(|| snapshot.original_path.clone());

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| HistoryError::from_io(e, parent))?;
        }
        fs::write(&target, content)
            .await
            .map_err(|e| HistoryError::from_io(e, &target))?;

        info!(
            target = %target.display(),
            timestamp = %snapshot.timestamp,
            "Restored snapshot"
        );
        Ok(target)
    }

    /// Unified diff from a snapshot to the current file on disk.
    ///
    /// A missing current file diffs against empty content. Identical content
    /// yields an empty string.
    pub async fn diff(&self, snapshot: &Snapshot) -> HistoryResult<String> {
        let old = self.read_content(snapshot).await?;
        let new = match fs::read(&snapshot.original_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(HistoryError::from_io(e, &snapshot.original_path)),
        };

        if old == new {
            return Ok(String::new());
        }

        let old_label = format!("{} @ {}", snapshot.original_path.display(), snapshot.timestamp);
        let new_label = format!("{} (current)", snapshot.original_path.display());
        Ok(generate_diff(
            &String::from_utf8_lossy(&old),
            &String::from_utf8_lossy(&new),
            &old_label,
            &new_label,
        ))
    }

    /// Count tracked files, snapshots and stored bytes.
    pub async fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();
        for key in self.keys().await {
            let pairs = self.blob_pairs(&key).await;
            if pairs.is_empty() {
                continue;
            }
            stats.files += 1;
            stats.snapshots += pairs.len();
            for pair in &pairs {
                if let Ok(metadata) = fs::metadata(&pair.content_path).await {
                    stats.bytes += metadata.len();
                }
            }
        }
        stats
    }

    /// List the content/sidecar pairs under `key`.
    ///
    /// A blob without sidecar, a sidecar without blob, and any name that
    /// does not parse are skipped.
    async fn blob_pairs(&self, key: &StorageKey) -> Vec<BlobPair> {
        let dir = self.key_dir(key);
        let names = list_file_names(&dir).await;

        let mut pairs = Vec::new();
        for name in &names {
            let meta_name = format!("{name}.{META_EXTENSION}");
            if names.contains(&meta_name) {
                match parse_blob_name(name) {
                    Some((timestamp, _)) => {
                        let content_path = dir.join(name);
                        pairs.push(BlobPair {
                            timestamp,
                            meta_path: sidecar_path(&content_path),
                            content_path,
                        });
                    }
                    None => debug!(dir = %dir.display(), name = %name, "Skipping unparsable blob name"),
                }
                continue;
            }

            let is_sidecar = name
                .strip_suffix(META_EXTENSION)
                .and_then(|stem| stem.strip_suffix('.'))
                .is_some_and(|stem| names.contains(stem));
            if !is_sidecar && !name.starts_with('.') {
                debug!(dir = %dir.display(), name = %name, "Skipping unmatched history entry");
            }
        }
        pairs
    }
}

/// Names of the regular files in `dir`. Unreadable entries are left out.
async fn list_file_names(dir: &Path) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to list history directory");
            }
            return names;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                    continue;
                }
                if let Ok(name) = entry.file_name().into_string() {
                    names.insert(name);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "History directory listing interrupted");
                break;
            }
        }
    }
    names
}

/// Read the original path recorded in a sidecar.
async fn read_sidecar(meta_path: &Path) -> HistoryResult<PathBuf> {
    let content = fs::read(meta_path)
        .await
        .map_err(|e| HistoryError::from_io(e, meta_path))?;
    let end = content
        .iter()
        .rposition(|b| !matches!(b, b'\n' | b'\r'))
        .map_or(0, |i| i + 1);
    if end == 0 {
        return Err(HistoryError::corrupt(format!(
            "empty sidecar {}",
            meta_path.display()
        )));
    }
    Ok(path_from_bytes(&content[..end]))
}

/// Rebuild a path from the raw bytes a sidecar holds.
#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Write through a hidden temp file and rename into place.
async fn write_atomic(path: &Path, content: &[u8]) -> HistoryResult<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{name}.tmp"));

    let result = match fs::write(&temp_path, content).await {
        Ok(()) => fs::rename(&temp_path, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(HistoryError::from_io(e, path));
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> HistoryResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HistoryError::from_io(e, path)),
    }
}

/// Generate a unified diff between two strings.
fn generate_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    output.push_str(&format!("--- {old_label}\n"));
    output.push_str(&format!("+++ {new_label}\n"));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };

                output.push_str(sign);
                output.push_str(change.value());
                if !change.value().ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }

    output
}
