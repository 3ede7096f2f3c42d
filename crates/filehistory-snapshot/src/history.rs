//! The boundary used by editor integrations and the command line.

use crate::gate::{ChangeGate, GateDecision};
use crate::query::{DayGroup, HistoryQuery, RecencyGroup};
use crate::store::{SnapshotSelector, StoreStats};
use crate::{
    HistoryConfig, HistoryError, HistoryResult, RetentionPolicy, Snapshot, SnapshotStore,
    StorageKey,
};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Why a change notification did not produce a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// History is turned off in configuration.
    Disabled,
    /// The path matches an exclusion pattern or lies inside the store.
    Excluded,
    /// The path is not an existing regular file.
    Missing,
    /// The path was captured within the debounce window.
    Debounced,
    /// A capture for the same source is still running.
    Busy,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Excluded => "excluded",
            Self::Missing => "missing",
            Self::Debounced => "debounced",
            Self::Busy => "busy",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a change notification.
#[derive(Debug)]
pub enum CaptureOutcome {
    Captured(Snapshot),
    Skipped(SkipReason),
    /// The capture was attempted and failed. Already logged.
    Failed(HistoryError),
}

impl CaptureOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured(_))
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Captured(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// A storage-key directory that failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyIssue {
    pub key: StorageKey,
    pub message: String,
}

/// Outcome of verifying every directory in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// File history for one workspace.
///
/// Routes change notifications through a [`ChangeGate`] into a
/// [`SnapshotStore`] and serves listings through a [`HistoryQuery`].
#[derive(Debug)]
pub struct FileHistory {
    config: HistoryConfig,
    store: SnapshotStore,
    gate: ChangeGate,
    query: HistoryQuery,
}

impl FileHistory {
    /// Open the history described by `config`.
    ///
    /// Only an inaccessible store root is an error.
    pub async fn open(config: HistoryConfig, workspace_root: Option<PathBuf>) -> HistoryResult<Self> {
        let store = SnapshotStore::open(
            config.resolved_store_root(),
            RetentionPolicy::from_config(&config),
        )
        .await?;
        let gate = ChangeGate::from_config(&config, workspace_root.clone());
        let query = match workspace_root {
            Some(root) => HistoryQuery::new().with_workspace_root(root),
            None => HistoryQuery::new(),
        };

        Ok(Self {
            config,
            store,
            gate,
            query,
        })
    }

    /// Replace the change gate.
    pub fn with_gate(mut self, gate: ChangeGate) -> Self {
        self.gate = gate;
        self
    }

    /// Replace the listing options.
    pub fn with_query(mut self, query: HistoryQuery) -> Self {
        self.query = query;
        self
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn gate(&self) -> &ChangeGate {
        &self.gate
    }

    pub fn query(&self) -> &HistoryQuery {
        &self.query
    }

    /// Handle a save or on-disk modification of `path` reported by `source`.
    pub async fn notify_changed(&self, path: &Path, source: &str) -> CaptureOutcome {
        self.notify_changed_at(path, source, Instant::now()).await
    }

    /// [`FileHistory::notify_changed`] with the notification arriving at `now`.
    pub async fn notify_changed_at(&self, path: &Path, source: &str, now: Instant) -> CaptureOutcome {
        if !self.config.enabled {
            return CaptureOutcome::Skipped(SkipReason::Disabled);
        }

        let path = self.store.absolute(path);
        match self.gate.evaluate_at(&path, now) {
            GateDecision::Capture => {}
            GateDecision::Excluded => return CaptureOutcome::Skipped(SkipReason::Excluded),
            GateDecision::Missing => return CaptureOutcome::Skipped(SkipReason::Missing),
            GateDecision::Debounced => return CaptureOutcome::Skipped(SkipReason::Debounced),
        }

        let Some(_guard) = self.gate.begin(source) else {
            self.gate.release(&path);
            debug!(source, path = %path.display(), "Capture already running for source");
            return CaptureOutcome::Skipped(SkipReason::Busy);
        };

        match self.store.capture(&path).await {
            Ok(snapshot) => CaptureOutcome::Captured(snapshot),
            Err(e) => {
                if matches!(e, HistoryError::NotFound(_)) {
                    debug!(path = %path.display(), error = %e, "Capture skipped");
                } else {
                    warn!(path = %path.display(), error = %e, "Capture failed");
                }
                CaptureOutcome::Failed(e)
            }
        }
    }

    /// Capture `path` right away, bypassing exclusion and debounce.
    pub async fn capture(&self, path: &Path) -> HistoryResult<Snapshot> {
        if !self.config.enabled {
            return Err(HistoryError::Disabled);
        }
        self.store.capture(path).await
    }

    /// History of one file in the configured sort order.
    pub async fn list_for(&self, path: &Path) -> Vec<Snapshot> {
        let mut entries = self.store.entries_for(path).await;
        self.query.sort(&mut entries);
        entries
    }

    /// Every live snapshot matching `filter`, grouped into recency windows.
    pub async fn list_all(&self, filter: Option<&str>) -> Vec<RecencyGroup> {
        let entries = self.query.filter(self.store.all_entries().await, filter);
        self.query.group_by_recency(entries, Local::now())
    }

    /// Every live snapshot matching `filter`, grouped by calendar day.
    pub async fn list_all_by_day(&self, filter: Option<&str>) -> Vec<DayGroup> {
        let entries = self.query.filter(self.store.all_entries().await, filter);
        self.query.group_by_day(entries, Local::now().date_naive())
    }

    pub async fn read_content(&self, snapshot: &Snapshot) -> HistoryResult<Vec<u8>> {
        self.store.read_content(snapshot).await
    }

    /// Delete the history of `path`, or everything when `None`.
    pub async fn purge(&self, path: Option<&Path>) -> HistoryResult<usize> {
        self.store.purge(path).await
    }

    /// Apply retention to every file in the store.
    pub async fn prune_all(&self) -> usize {
        self.store.retention().prune_all(&self.store).await
    }

    pub async fn find(&self, path: &Path, selector: SnapshotSelector) -> HistoryResult<Snapshot> {
        self.store.find(path, selector).await
    }

    /// Write `snapshot` back to its original path, or to `target`.
    ///
    /// When overwriting the original, its current content is captured first
    /// so the restore can itself be undone.
    pub async fn restore(&self, snapshot: &Snapshot, target: Option<&Path>) -> HistoryResult<PathBuf> {
        let content = self.store.read_content(snapshot).await?;

        if target.is_none() && snapshot.original_path.is_file() {
            if let Err(e) = self.store.capture(&snapshot.original_path).await {
                warn!(
                    path = %snapshot.original_path.display(),
                    error = %e,
                    "Failed to capture current content before restore"
                );
            }
        }

        self.store.write_restored(snapshot, &content, target).await
    }

    pub async fn diff(&self, snapshot: &Snapshot) -> HistoryResult<String> {
        self.store.diff(snapshot).await
    }

    /// Check every storage-key directory for sidecars that disagree.
    pub async fn verify(&self) -> VerifyReport {
        let mut report = VerifyReport::default();
        for key in self.store.keys().await {
            report.checked += 1;
            if let Err(e) = self.store.verify_key(&key).await {
                warn!(key = %key, error = %e, "History directory failed verification");
                report.issues.push(VerifyIssue {
                    key,
                    message: e.to_string(),
                });
            }
        }
        report
    }

    pub async fn stats(&self) -> StoreStats {
        self.store.stats().await
    }

    /// Path shown to users for `snapshot`.
    pub fn display_path(&self, snapshot: &Snapshot) -> String {
        self.query.display_path(snapshot)
    }
}
