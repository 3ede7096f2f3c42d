//! Count- and age-based retention of per-file history.

use crate::{HistoryConfig, Snapshot, SnapshotStore, StorageKey};
use chrono::{DateTime, Duration, Local, NaiveDateTime};
use filehistory_util::TimingGuard;
use std::path::Path;
use tracing::{debug, info, warn};

/// Bounds on one file's history.
///
/// The two limits are independent: an entry is evicted if it violates
/// either of them. A limit of `0` is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep at most this many snapshots per file.
    pub max_count: usize,

    /// Drop snapshots older than this many days.
    pub max_age_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

impl RetentionPolicy {
    /// Create a policy with both limits.
    pub fn new(max_count: usize, max_age_days: u32) -> Self {
        Self {
            max_count,
            max_age_days,
        }
    }

    /// A policy that never evicts anything.
    pub fn unlimited() -> Self {
        Self::new(0, 0)
    }

    /// Build the policy from configuration.
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.max_history_entries, config.max_age_days)
    }

    /// Whether the policy can never evict.
    pub fn is_unlimited(&self) -> bool {
        self.max_count == 0 && self.max_age_days == 0
    }

    /// Oldest capture time that survives the age limit.
    fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.max_age_days == 0 {
            return None;
        }
        now.checked_sub_signed(Duration::days(i64::from(self.max_age_days)))
    }

    /// Select the entries to evict from a newest-first history.
    pub fn expired<'a>(&self, entries: &'a [Snapshot], now: DateTime<Local>) -> Vec<&'a Snapshot> {
        let cutoff = self.cutoff(now.naive_local());
        entries
            .iter()
            .enumerate()
            .filter(|(index, entry)| {
                let over_count = self.max_count > 0 && *index >= self.max_count;
                let too_old = cutoff.is_some_and(|c| entry.timestamp.naive() < c);
                over_count || too_old
            })
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Prune the history of `path` against the current time.
    ///
    /// Returns the number of snapshots removed.
    pub async fn prune(&self, store: &SnapshotStore, path: &Path) -> usize {
        self.prune_at(store, path, Local::now()).await
    }

    /// Prune the history of `path` as if the current time were `now`.
    pub async fn prune_at(&self, store: &SnapshotStore, path: &Path, now: DateTime<Local>) -> usize {
        let path = store.absolute(path);
        let key = StorageKey::for_path(&path);
        self.prune_key(store, &key, &path, now).await
    }

    /// Prune one storage-key directory whose files belong to `original`.
    pub async fn prune_key(
        &self,
        store: &SnapshotStore,
        key: &StorageKey,
        original: &Path,
        now: DateTime<Local>,
    ) -> usize {
        if self.is_unlimited() {
            return 0;
        }

        let entries = store.entries_for_key(key, original).await;
        let expired = self.expired(&entries, now);
        if expired.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for entry in &expired {
            match store.delete(entry).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    path = %entry.content_path.display(),
                    error = %e,
                    "Failed to evict snapshot"
                ),
            }
        }

        if removed == entries.len() {
            store.remove_key_dir_if_empty(key).await;
        }

        debug!(
            path = %original.display(),
            removed,
            kept = entries.len() - removed,
            "Pruned file history"
        );
        removed
    }

    /// Prune every file in the store.
    ///
    /// Each storage-key directory is resolved to its original path through
    /// the first readable sidecar; unresolvable directories are skipped.
    pub async fn prune_all(&self, store: &SnapshotStore) -> usize {
        self.prune_all_at(store, Local::now()).await
    }

    /// [`RetentionPolicy::prune_all`] against an explicit current time.
    pub async fn prune_all_at(&self, store: &SnapshotStore, now: DateTime<Local>) -> usize {
        let _timing = TimingGuard::store("prune_all");
        let mut removed = 0;

        for key in store.keys().await {
            match store.resolve_original(&key).await {
                Some(original) => removed += self.prune_key(store, &key, &original, now).await,
                None => debug!(key = %key, "Skipping history directory without a readable sidecar"),
            }
        }

        if removed > 0 {
            info!("Pruned {} snapshots", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .earliest()
            .unwrap()
    }

    /// Newest-first history with one entry per `days_ago` value.
    fn history(days_ago: &[i64]) -> Vec<Snapshot> {
        let path = PathBuf::from("/proj/a.txt");
        let key = StorageKey::for_path(&path);
        let dir = Path::new("/store").join(key.as_str());
        days_ago
            .iter()
            .map(|d| {
                let at = now().naive_local() - Duration::days(*d);
                Snapshot::locate(
                    path.clone(),
                    key.clone(),
                    Timestamp::from_naive(at),
                    &dir,
                    "a.txt",
                )
            })
            .collect()
    }

    #[test]
    fn count_limit_keeps_newest() {
        let entries = history(&[0, 1, 2, 3]);
        let policy = RetentionPolicy::new(2, 0);
        let expired = policy.expired(&entries, now());
        assert_eq!(expired, vec![&entries[2], &entries[3]]);
    }

    #[test]
    fn age_limit_drops_old_entries() {
        let entries = history(&[0, 3, 8, 30]);
        let policy = RetentionPolicy::new(0, 7);
        let expired = policy.expired(&entries, now());
        assert_eq!(expired, vec![&entries[2], &entries[3]]);
    }

    #[test]
    fn limits_combine_as_union() {
        let entries = history(&[0, 1, 2, 10]);
        let policy = RetentionPolicy::new(2, 7);
        let expired = policy.expired(&entries, now());
        // index 2 violates the count, index 3 violates both
        assert_eq!(expired, vec![&entries[2], &entries[3]]);
    }

    #[test]
    fn entry_exactly_at_cutoff_survives() {
        let entries = history(&[7]);
        let policy = RetentionPolicy::new(0, 7);
        assert!(policy.expired(&entries, now()).is_empty());
    }

    #[test]
    fn unlimited_policy_evicts_nothing() {
        let entries = history(&[0, 100, 1000]);
        let policy = RetentionPolicy::unlimited();
        assert!(policy.is_unlimited());
        assert!(policy.expired(&entries, now()).is_empty());
    }

    #[test]
    fn from_config_copies_limits() {
        let config = HistoryConfig {
            max_history_entries: 3,
            max_age_days: 2,
            ..HistoryConfig::default()
        };
        assert_eq!(RetentionPolicy::from_config(&config), RetentionPolicy::new(3, 2));
    }

    async fn setup(policy: RetentionPolicy) -> (TempDir, SnapshotStore) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path().join("store"), policy)
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn prune_removes_blob_and_sidecar() {
        let (dir, store) = setup(RetentionPolicy::unlimited()).await;
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "v").unwrap();

        let base = Local::now().naive_local();
        let mut captured = Vec::new();
        for secs in [30, 20, 10] {
            let at = Timestamp::from_naive(base - Duration::seconds(secs));
            captured.push(store.capture_at(&file, at).await.unwrap());
        }

        let removed = RetentionPolicy::new(1, 0).prune(&store, &file).await;
        assert_eq!(removed, 2);

        let remaining = store.entries_for(&file).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, captured[2].timestamp);
        for gone in &captured[..2] {
            assert!(!gone.content_path.exists());
            assert!(!gone.meta_path.exists());
        }
    }

    #[tokio::test]
    async fn prune_all_visits_every_file() {
        let (dir, store) = setup(RetentionPolicy::unlimited()).await;
        let files = [dir.path().join("a.txt"), dir.path().join("b.txt")];
        let base = Local::now().naive_local();
        for file in &files {
            std::fs::write(file, "x").unwrap();
            for days in [0, 10, 20] {
                let at = Timestamp::from_naive(base - Duration::days(days));
                store.capture_at(file, at).await.unwrap();
            }
        }

        let removed = RetentionPolicy::new(0, 7).prune_all(&store).await;
        assert_eq!(removed, 4);
        for file in &files {
            assert_eq!(store.entries_for(file).await.len(), 1);
        }
    }

    #[tokio::test]
    async fn fully_expired_history_removes_directory() {
        let (dir, store) = setup(RetentionPolicy::unlimited()).await;
        let file = dir.path().join("old.txt");
        std::fs::write(&file, "x").unwrap();
        let at = Timestamp::from_naive(Local::now().naive_local() - Duration::days(30));
        let snapshot = store.capture_at(&file, at).await.unwrap();

        let removed = RetentionPolicy::new(0, 7).prune(&store, &file).await;
        assert_eq!(removed, 1);
        assert!(!store.key_dir(&snapshot.storage_key).exists());
    }
}
