//! Local file history for filehistory.
//!
//! This crate keeps timestamped copies of files as they change:
//! - Content-addressed per-file directories keyed by path digest
//! - Count- and age-based retention
//! - Exclusion patterns, debounce and in-flight guarding of captures
//! - Listings grouped by day or by recency window
//!
//! # Example
//!
//! ```no_run
//! use filehistory_snapshot::{FileHistory, HistoryConfig};
//! use std::path::{Path, PathBuf};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let history = FileHistory::open(
//!     HistoryConfig::default(),
//!     Some(PathBuf::from("/project/root")),
//! ).await?;
//!
//! // Called by the watcher on every save
//! history.notify_changed(Path::new("/project/root/src/main.rs"), "watcher").await;
//!
//! // Browse and read back
//! for snapshot in history.list_for(Path::new("/project/root/src/main.rs")).await {
//!     let bytes = history.read_content(&snapshot).await?;
//!     println!("{} {} bytes", snapshot.timestamp, bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod gate;
mod history;
mod key;
pub mod query;
mod retention;
mod snapshot;
mod store;

pub use config::{default_excluded_patterns, HistoryConfig};
pub use error::{HistoryError, HistoryResult};
pub use gate::{ChangeGate, DebounceState, ExclusionRules, GateDecision, InFlightGuard};
pub use history::{CaptureOutcome, FileHistory, SkipReason, VerifyIssue, VerifyReport};
pub use key::StorageKey;
pub use query::{DayGroup, HistoryQuery, RecencyBucket, RecencyGroup, SortOrder};
pub use retention::RetentionPolicy;
pub use snapshot::{Snapshot, Timestamp};
pub use store::{SnapshotSelector, SnapshotStore, StoreStats};
