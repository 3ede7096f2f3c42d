//! Snapshot error types.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur while capturing, listing, or pruning history.
///
/// Everything except [`HistoryError::StoreUnavailable`] is contained at the
/// component boundary: listings omit the entry, captures are skipped.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Source file or snapshot vanished.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Capture, read, or delete was refused by the OS.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Sidecar and content file disagree or one of them is missing.
    #[error("Corrupt history entry: {0}")]
    CorruptEntry(String),

    /// Bad pattern or path in configuration.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The store root cannot be created or accessed.
    #[error("Snapshot store unavailable at {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// History capture is switched off.
    #[error("File history is disabled")]
    Disabled,

    /// Any other IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl HistoryError {
    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a corrupt entry error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptEntry(message.into())
    }

    /// Create a config error.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid(message.into())
    }

    /// Classify an IO error that happened while touching `path`.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(path.display().to_string())
            }
            _ => Self::Io(err),
        }
    }

    /// Whether the error only affects a single entry or file.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::StoreUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_io_classifies_by_kind() {
        let path = Path::new("/a/b.txt");
        let err = HistoryError::from_io(io::Error::new(io::ErrorKind::NotFound, "gone"), path);
        assert!(matches!(err, HistoryError::NotFound(ref p) if p == "/a/b.txt"));

        let err = HistoryError::from_io(
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
            path,
        );
        assert!(matches!(err, HistoryError::PermissionDenied(_)));

        let err = HistoryError::from_io(io::Error::other("disk"), path);
        assert!(matches!(err, HistoryError::Io(_)));
    }

    #[test]
    fn only_store_unavailable_is_fatal() {
        assert!(HistoryError::not_found("x").is_recoverable());
        assert!(HistoryError::corrupt("x").is_recoverable());
        assert!(HistoryError::config_invalid("x").is_recoverable());
        let fatal = HistoryError::StoreUnavailable {
            path: PathBuf::from("/store"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "ro"),
        };
        assert!(!fatal.is_recoverable());
        assert!(fatal.to_string().contains("/store"));
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            HistoryError::not_found("/x").to_string(),
            "Not found: /x"
        );
        assert_eq!(
            HistoryError::Disabled.to_string(),
            "File history is disabled"
        );
    }
}
