//! Command handlers for the filehistory CLI.
//!
//! This module contains handlers for the various CLI subcommands,
//! split into logical groups.

pub mod browse;
pub mod capture;
pub mod logging;
pub mod maintain;
pub mod watch;

pub use browse::*;
pub use capture::*;
pub use logging::*;
pub use maintain::*;
pub use watch::*;

use clap::Args;
use filehistory_snapshot::{SnapshotSelector, Timestamp};

/// Which snapshot of a file a command acts on.
#[derive(Args, Debug, Default)]
pub struct SelectorArgs {
    /// Snapshot taken at this time (YYYY-MM-DD_HH-MM-SS)
    #[arg(long, conflicts_with = "index")]
    pub at: Option<String>,

    /// Snapshot at this position, 0 being the newest
    #[arg(long)]
    pub index: Option<usize>,
}

impl SelectorArgs {
    /// Turn the flags into a selector, defaulting to the latest snapshot.
    pub fn selector(&self) -> anyhow::Result<SnapshotSelector> {
        match (&self.at, self.index) {
            (Some(at), _) => Timestamp::parse(at)
                .map(SnapshotSelector::At)
                .ok_or_else(|| anyhow::anyhow!("Invalid timestamp '{at}', expected YYYY-MM-DD_HH-MM-SS")),
            (None, Some(index)) => Ok(SnapshotSelector::Index(index)),
            (None, None) => Ok(SnapshotSelector::Latest),
        }
    }
}

/// Render a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_defaults_to_latest() {
        let args = SelectorArgs::default();
        assert_eq!(args.selector().unwrap(), SnapshotSelector::Latest);
    }

    #[test]
    fn test_selector_parses_timestamp() {
        let args = SelectorArgs {
            at: Some("2024-05-15_09-30-00".to_string()),
            index: None,
        };
        let expected = Timestamp::parse("2024-05-15_09-30-00").unwrap();
        assert_eq!(args.selector().unwrap(), SnapshotSelector::At(expected));

        let bad = SelectorArgs {
            at: Some("yesterday".to_string()),
            index: None,
        };
        assert!(bad.selector().is_err());
    }

    #[test]
    fn test_selector_index() {
        let args = SelectorArgs {
            at: None,
            index: Some(2),
        };
        assert_eq!(args.selector().unwrap(), SnapshotSelector::Index(2));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
