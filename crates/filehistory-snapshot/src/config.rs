//! Configuration consumed by the history engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for file history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Whether captures are taken at all.
    pub enabled: bool,

    /// Maximum snapshots kept per file. `0` disables the count limit.
    pub max_history_entries: usize,

    /// Maximum age of a snapshot in days. `0` disables the age limit.
    pub max_age_days: u32,

    /// Glob patterns of files that are never captured.
    pub excluded_patterns: Vec<String>,

    /// Where snapshots live. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_root: Option<PathBuf>,

    /// Minimum interval between two captures of the same file.
    pub debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history_entries: 30,
            max_age_days: 7,
            excluded_patterns: default_excluded_patterns(),
            store_root: None,
            debounce_ms: 1000,
        }
    }
}

impl HistoryConfig {
    /// Configured store root, or the platform default.
    pub fn resolved_store_root(&self) -> PathBuf {
        self.store_root
            .clone()
            .unwrap_or_else(filehistory_util::path::default_store_root)
    }

    /// Debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Patterns excluded when nothing else is configured.
pub fn default_excluded_patterns() -> Vec<String> {
    ["**/.git/**", "**/node_modules/**", "**/target/**", "**/.history/**"]
        .into_iter()
        .map(String::from)
        .collect()
}
