//! Snapshot data structures.

use crate::StorageKey;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Extension of the metadata sidecar next to each content blob.
pub const META_EXTENSION: &str = "meta";

/// Capture time, second granularity, in local wall-clock time.
///
/// Encoded as `YYYY-MM-DD_HH-MM-SS`. The encoding is fixed width, so string
/// order and chronological order agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// `strftime` format of the on-disk encoding.
    pub const FORMAT: &'static str = "%Y-%m-%d_%H-%M-%S";

    /// Length of the encoded form.
    pub const LEN: usize = 19;

    /// The current local time, truncated to the second.
    pub fn now() -> Self {
        Self::from_local(Local::now())
    }

    /// Truncate a local date-time to a timestamp.
    pub fn from_local(at: DateTime<Local>) -> Self {
        Self::from_naive(at.naive_local())
    }

    /// Truncate a naive local date-time to a timestamp.
    pub fn from_naive(at: NaiveDateTime) -> Self {
        Self(at.with_nanosecond(0).unwrap_or(at))
    }

    /// Parse the on-disk encoding.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != Self::LEN {
            return None;
        }
        NaiveDateTime::parse_from_str(s, Self::FORMAT).ok().map(Self)
    }

    /// Local wall-clock date-time of the capture.
    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Local calendar date of the capture.
    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}")))
    }
}

/// One immutable captured copy of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Absolute path of the file at capture time.
    pub original_path: PathBuf,

    /// Key of the directory holding this file's history.
    pub storage_key: StorageKey,

    /// When the snapshot was taken.
    pub timestamp: Timestamp,

    /// Stored content blob.
    pub content_path: PathBuf,

    /// Sidecar recording `original_path`.
    pub meta_path: PathBuf,
}

impl Snapshot {
    /// Describe the snapshot of `original_path` stored at `timestamp` in `key_dir`.
    pub fn locate(
        original_path: PathBuf,
        storage_key: StorageKey,
        timestamp: Timestamp,
        key_dir: &Path,
        basename: &str,
    ) -> Self {
        let content_path = key_dir.join(blob_name(&timestamp, basename));
        let meta_path = sidecar_path(&content_path);
        Self {
            original_path,
            storage_key,
            timestamp,
            content_path,
            meta_path,
        }
    }

    /// Basename of the original file.
    pub fn file_name(&self) -> String {
        self.original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Newest first, then by original path, then by blob name.
    ///
    /// This is a total order, so listings that mix files are deterministic
    /// even when captures share a second.
    pub fn newest_first(a: &Snapshot, b: &Snapshot) -> Ordering {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.original_path.cmp(&b.original_path))
            .then_with(|| a.content_path.cmp(&b.content_path))
    }
}

/// Name of the content blob: `{timestamp}_{basename}`.
pub fn blob_name(timestamp: &Timestamp, basename: &str) -> String {
    format!("{timestamp}_{basename}")
}

/// Split a blob name into its timestamp and basename.
pub fn parse_blob_name(name: &str) -> Option<(Timestamp, &str)> {
    let stamp = name.get(..Timestamp::LEN)?;
    let rest = name.get(Timestamp::LEN..)?.strip_prefix('_')?;
    if rest.is_empty() {
        return None;
    }
    Some((Timestamp::parse(stamp)?, rest))
}

/// Sidecar location for a content blob.
pub fn sidecar_path(content_path: &Path) -> PathBuf {
    let mut name = content_path.as_os_str().to_owned();
    name.push(".");
    name.push(META_EXTENSION);
    PathBuf::from(name)
}
