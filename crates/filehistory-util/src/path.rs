//! Path utilities.
//!
//! This module provides platform directories and helpers for working with
//! file paths.

use std::path::{Component, Path, PathBuf};

/// Get the filehistory configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/filehistory` if set
/// - `~/.config/filehistory` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("filehistory"))
}

/// Get the filehistory data directory.
///
/// This follows XDG conventions:
/// - `$XDG_DATA_HOME/filehistory` if set
/// - `~/.local/share/filehistory` otherwise
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("filehistory"))
}

/// Default location of the snapshot store when none is configured.
pub fn default_store_root() -> PathBuf {
    data_dir()
        .map(|p| p.join("snapshots"))
        .unwrap_or_else(|| PathBuf::from(".filehistory/snapshots"))
}

/// Get the log directory path.
pub fn log_dir() -> PathBuf {
    // macOS: ~/Library/Logs/filehistory
    // Linux: ~/.local/state/filehistory/logs
    // Windows: %LOCALAPPDATA%/filehistory/logs

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs/filehistory");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) = dirs::state_dir() {
            return state_dir.join("filehistory/logs");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".local/state/filehistory/logs");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app) = dirs::data_local_dir() {
            return local_app.join("filehistory/logs");
        }
    }

    PathBuf::from(".filehistory/logs")
}

/// Check if a path is within a base directory.
pub fn is_within(path: &Path, base: &Path) -> bool {
    let canonical_path = path.canonicalize().ok();
    let canonical_base = base.canonicalize().ok();

    match (canonical_path, canonical_base) {
        (Some(p), Some(b)) => p.starts_with(&b),
        // Either side may not exist yet; fall back to a lexical check.
        _ => normalize(path).starts_with(normalize(base)),
    }
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}

/// Turn `path` into an absolute, normalized path, resolving relative paths
/// against `base`.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Make a path relative to a base directory.
///
/// Returns `None` if the path is not within the base directory.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Prefix(prefix) => {
                out.push_str(&prefix.as_os_str().to_string_lossy());
            }
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}
