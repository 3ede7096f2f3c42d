//! Duration logging for whole-store operations.
//!
//! # Example
//!
//! ```rust,ignore
//! use filehistory_util::TimingGuard;
//!
//! async fn prune_everything(store: &SnapshotStore) {
//!     let _timing = TimingGuard::store("prune_all");
//!     // ... walk every storage key ...
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How loudly a finished operation is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loudness {
    Quiet,
    Notable,
    Slow,
}

/// Logs the time between its creation and its drop.
///
/// Short operations are logged at debug, longer ones at info, and slow
/// ones at warn.
#[derive(Debug)]
pub struct TimingGuard {
    scope: &'static str,
    name: String,
    start: Instant,
    notable_after: Duration,
    slow_after: Duration,
}

impl TimingGuard {
    pub fn new(scope: &'static str, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            start: Instant::now(),
            notable_after: Duration::from_millis(250),
            slow_after: Duration::from_secs(5),
        }
    }

    /// Guard for an operation spanning the whole snapshot store.
    pub fn store(name: impl Into<String>) -> Self {
        Self::new("store", name)
    }

    /// Report at info from `after` on.
    pub fn with_info_threshold(mut self, after: Duration) -> Self {
        self.notable_after = after;
        self
    }

    /// Report at warn from `after` on.
    pub fn with_warn_threshold(mut self, after: Duration) -> Self {
        self.slow_after = after;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn loudness(&self, elapsed: Duration) -> Loudness {
        if elapsed >= self.slow_after {
            Loudness::Slow
        } else if elapsed >= self.notable_after {
            Loudness::Notable
        } else {
            Loudness::Quiet
        }
    }
}

/// Render a duration as `42ms`, `1.50s` or `1m 1.0s`.
fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    match ms {
        0..=999 => format!("{ms}ms"),
        1_000..=59_999 => format!("{:.2}s", elapsed.as_secs_f64()),
        _ => format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0),
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let duration = format_duration(elapsed);
        let (scope, name) = (self.scope, self.name.as_str());

        match self.loudness(elapsed) {
            Loudness::Slow => warn!(scope, name, %duration, "Slow operation completed"),
            Loudness::Notable => info!(scope, name, %duration, "Operation completed"),
            Loudness::Quiet => debug!(scope, name, %duration, "Operation completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_grows() {
        let guard = TimingGuard::store("all_entries");
        std::thread::sleep(Duration::from_millis(10));
        assert!(guard.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_loudness_thresholds() {
        let guard = TimingGuard::new("test", "thresholds")
            .with_info_threshold(Duration::from_millis(50))
            .with_warn_threshold(Duration::from_millis(1000));

        assert_eq!(guard.loudness(Duration::from_millis(10)), Loudness::Quiet);
        assert_eq!(guard.loudness(Duration::from_millis(50)), Loudness::Notable);
        assert_eq!(guard.loudness(Duration::from_secs(2)), Loudness::Slow);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_millis(61_000)), "1m 1.0s");
    }
}
