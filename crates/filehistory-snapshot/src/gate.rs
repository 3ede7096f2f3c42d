//! Filtering of change notifications before they reach the store.

use crate::HistoryConfig;
use filehistory_util::path::{is_within, relative_to, to_slash};
use glob::{MatchOptions, Pattern};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Past this many tracked paths, stale debounce entries are dropped.
const DEBOUNCE_SWEEP_THRESHOLD: usize = 1024;

/// `*` and `?` stay within one path component; only `**` crosses `/`.
fn match_options() -> MatchOptions {
    MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    }
}

#[derive(Debug)]
enum Rule {
    /// `**/<name>/**`: any path with a `<name>` directory component.
    Component { needle: String },
    Glob(Pattern),
}

/// Compiled exclusion patterns.
///
/// Patterns of the form `**/<name>/**` with a literal `<name>` are answered
/// with a substring test on the slash-separated path; everything else goes
/// through `glob::Pattern`. Both give the same answer.
#[derive(Debug, Default)]
pub struct ExclusionRules {
    rules: Vec<Rule>,
    base: Option<PathBuf>,
}

impl ExclusionRules {
    /// Compile `patterns`, matched against paths relative to `base` when the
    /// path lies inside it.
    ///
    /// A pattern that does not compile is logged and never matches.
    pub fn new<S: AsRef<str>>(patterns: &[S], base: Option<PathBuf>) -> Self {
        let rules = patterns
            .iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                if let Some(name) = component_name(pattern) {
                    return Some(Rule::Component {
                        needle: format!("/{name}/"),
                    });
                }
                match Pattern::new(pattern) {
                    Ok(compiled) => Some(Rule::Glob(compiled)),
                    Err(e) => {
                        warn!(pattern, error = %e, "Ignoring invalid exclusion pattern");
                        None
                    }
                }
            })
            .collect();

        Self { rules, base }
    }

    /// Number of usable rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` matches any rule.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let target = self
            .base
            .as_deref()
            .and_then(|base| relative_to(path, base))
            .map(|rel| to_slash(&rel))
            .unwrap_or_else(|| to_slash(path));
        let rooted = if target.starts_with('/') {
            target.clone()
        } else {
            format!("/{target}")
        };

        let options = match_options();
        self.rules.iter().any(|rule| match rule {
            Rule::Component { needle } => rooted.contains(needle.as_str()),
            Rule::Glob(pattern) => pattern.matches_with(&target, options),
        })
    }
}

/// Literal directory name of a `**/<name>/**` pattern.
fn component_name(pattern: &str) -> Option<&str> {
    let name = pattern.strip_prefix("**/")?.strip_suffix("/**")?;
    let literal = !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, '*' | '?' | '[' | ']' | '{' | '}' | '/' | '\\'));
    literal.then_some(name)
}

/// Per-path time of the last honored capture request.
///
/// Leading-edge debounce: the first request in a burst wins and later ones
/// inside the window are dropped, not deferred.
#[derive(Debug)]
pub struct DebounceState {
    window: Duration,
    last: HashMap<PathBuf, Instant>,
}

impl DebounceState {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Honor a request for `path` at `now` unless one was honored within the
    /// window. Only honored requests move the window.
    pub fn try_acquire(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(last) = self.last.get(path) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }

        if self.last.len() >= DEBOUNCE_SWEEP_THRESHOLD {
            let window = self.window;
            self.last
                .retain(|_, last| now.saturating_duration_since(*last) < window);
        }
        self.last.insert(path.to_path_buf(), now);
        true
    }

    /// Drop the record for `path`.
    pub fn forget(&mut self, path: &Path) {
        self.last.remove(path);
    }

    /// Number of paths currently tracked.
    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Outcome of evaluating a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Go ahead and capture.
    Capture,
    /// Path matches an exclusion rule or lies inside the store.
    Excluded,
    /// Path is not an existing regular file.
    Missing,
    /// A capture for this path was honored within the debounce window.
    Debounced,
}

/// Marks a notification source as busy until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    sources: Arc<Mutex<HashSet<String>>>,
    source: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.source);
    }
}

/// Decides whether a change notification should become a capture.
#[derive(Debug)]
pub struct ChangeGate {
    rules: ExclusionRules,
    store_root: PathBuf,
    debounce: Mutex<DebounceState>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ChangeGate {
    /// Create a gate with a fresh debounce state.
    pub fn new(rules: ExclusionRules, store_root: impl Into<PathBuf>, window: Duration) -> Self {
        Self::with_state(rules, store_root, DebounceState::new(window))
    }

    /// Create a gate around an existing debounce state.
    pub fn with_state(
        rules: ExclusionRules,
        store_root: impl Into<PathBuf>,
        state: DebounceState,
    ) -> Self {
        Self {
            rules,
            store_root: store_root.into(),
            debounce: Mutex::new(state),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Build a gate from configuration.
    pub fn from_config(config: &HistoryConfig, workspace_root: Option<PathBuf>) -> Self {
        let rules = ExclusionRules::new(config.excluded_patterns.as_slice(), workspace_root);
        Self::new(rules, config.resolved_store_root(), config.debounce())
    }

    /// Whether `path` is excluded by configuration or lies in the store.
    pub fn is_excluded(&self, path: &Path) -> bool {
        is_within(path, &self.store_root) || self.rules.is_excluded(path)
    }

    /// Evaluate a notification for `path` now.
    pub fn evaluate(&self, path: &Path) -> GateDecision {
        self.evaluate_at(path, Instant::now())
    }

    /// Evaluate a notification for `path` arriving at `now`.
    ///
    /// Exclusion and existence are checked before the debounce window, so
    /// rejected notifications never consume it.
    pub fn evaluate_at(&self, path: &Path, now: Instant) -> GateDecision {
        let decision = if self.is_excluded(path) {
            GateDecision::Excluded
        } else if !path.is_file() {
            GateDecision::Missing
        } else if self
            .debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(path, now)
        {
            GateDecision::Capture
        } else {
            GateDecision::Debounced
        };

        if decision != GateDecision::Capture {
            debug!(path = %path.display(), ?decision, "Change notification filtered");
        }
        decision
    }

    /// Give back the debounce window taken for `path`, for a notification
    /// that was honored but never captured.
    pub fn release(&self, path: &Path) {
        self.debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .forget(path);
    }

    /// Mark `source` busy. Returns `None` if a capture for it is already
    /// running.
    pub fn begin(&self, source: &str) -> Option<InFlightGuard> {
        let mut sources = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !sources.insert(source.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            sources: Arc::clone(&self.in_flight),
            source: source.to_string(),
        })
    }
}
