//! Read-only views over snapshot listings.
//!
//! Nothing here touches the disk: every function takes the output of
//! [`SnapshotStore`](crate::SnapshotStore) listings and sorts, filters or
//! groups it for display.

use crate::Snapshot;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use filehistory_util::path::{relative_to, to_slash};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Order of entries inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Timestamp descending, then display path ascending.
    #[default]
    NewestFirst,
    /// Timestamp ascending, then display path ascending.
    OldestFirst,
    /// Display path ascending, then timestamp descending.
    ByPath,
}

/// A named, mutually exclusive time window.
///
/// Windows are tried in declaration order; an entry lands in the first one
/// whose lower bound it satisfies, or else in the bucket of its calendar
/// month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecencyBucket {
    LastHour,
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    Month { year: i32, month: u32 },
}

impl RecencyBucket {
    /// Human-readable name of the window.
    pub fn label(&self) -> String {
        match self {
            Self::LastHour => "Last hour".to_string(),
            Self::Today => "Today".to_string(),
            Self::Yesterday => "Yesterday".to_string(),
            Self::ThisWeek => "This week".to_string(),
            Self::LastWeek => "Last week".to_string(),
            Self::ThisMonth => "This month".to_string(),
            Self::Month { year, month } => NaiveDate::from_ymd_opt(*year, *month, 1)
                .map(|d| d.format("%B %Y").to_string())
                .unwrap_or_else(|| format!("{year}-{month:02}")),
        }
    }

    /// Display rank: fixed windows first, then months newest first.
    fn rank(&self) -> (u8, i64) {
        match self {
            Self::LastHour => (0, 0),
            Self::Today => (1, 0),
            Self::Yesterday => (2, 0),
            Self::ThisWeek => (3, 0),
            Self::LastWeek => (4, 0),
            Self::ThisMonth => (5, 0),
            Self::Month { year, month } => (6, -(i64::from(*year) * 12 + i64::from(*month))),
        }
    }
}

/// Find the bucket of a capture taken at `at`, seen from `now`.
///
/// Weeks start on Monday.
pub fn recency_bucket(at: NaiveDateTime, now: NaiveDateTime) -> RecencyBucket {
    let today = now.date();
    let today_start = today.and_time(NaiveTime::MIN);
    let yesterday_start = today_start - Duration::days(1);
    let week_start =
        today_start - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let last_week_start = week_start - Duration::days(7);
    let month_start = today
        .with_day(1)
        .unwrap_or(today)
        .and_time(NaiveTime::MIN);

    let windows = [
        (now - Duration::hours(1), RecencyBucket::LastHour),
        (today_start, RecencyBucket::Today),
        (yesterday_start, RecencyBucket::Yesterday),
        (week_start, RecencyBucket::ThisWeek),
        (last_week_start, RecencyBucket::LastWeek),
        (month_start, RecencyBucket::ThisMonth),
    ];

    windows
        .into_iter()
        .find(|(lower, _)| at >= *lower)
        .map(|(_, bucket)| bucket)
        .unwrap_or(RecencyBucket::Month {
            year: at.year(),
            month: at.month(),
        })
}

/// Label of a calendar day relative to `today`.
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%A, %B %-d, %Y").to_string()
    }
}

/// Snapshots captured on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub label: String,
    pub entries: Vec<Snapshot>,
}

/// Snapshots falling into one recency window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyGroup {
    pub bucket: RecencyBucket,
    pub entries: Vec<Snapshot>,
}

impl RecencyGroup {
    pub fn label(&self) -> String {
        self.bucket.label()
    }
}

/// Sorting, filtering and grouping of snapshot listings.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    workspace_root: Option<PathBuf>,
    sort: SortOrder,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show paths under `root` relative to it.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Order applied inside each group.
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Path shown to users: workspace-relative when possible.
    pub fn display_path(&self, snapshot: &Snapshot) -> String {
        self.workspace_root
            .as_deref()
            .and_then(|root| relative_to(&snapshot.original_path, root))
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(|rel| to_slash(&rel))
            .unwrap_or_else(|| to_slash(&snapshot.original_path))
    }

    fn compare(&self, a: &Snapshot, b: &Snapshot) -> Ordering {
        let by_path = || self.display_path(a).cmp(&self.display_path(b));
        match self.sort {
            SortOrder::NewestFirst => b.timestamp.cmp(&a.timestamp).then_with(by_path),
            SortOrder::OldestFirst => a.timestamp.cmp(&b.timestamp).then_with(by_path),
            SortOrder::ByPath => by_path().then_with(|| b.timestamp.cmp(&a.timestamp)),
        }
        .then_with(|| a.content_path.cmp(&b.content_path))
    }

    /// Sort entries in place with the configured order.
    pub fn sort(&self, entries: &mut [Snapshot]) {
        entries.sort_by(|a, b| self.compare(a, b));
    }

    /// Keep entries whose display path or file name contains `pattern`,
    /// ignoring case. A missing or blank pattern keeps everything.
    pub fn filter(&self, entries: Vec<Snapshot>, pattern: Option<&str>) -> Vec<Snapshot> {
        let needle = match pattern.map(str::trim) {
            Some(p) if !p.is_empty() => p.to_lowercase(),
            _ => return entries,
        };

        entries
            .into_iter()
            .filter(|s| {
                self.display_path(s).to_lowercase().contains(&needle)
                    || s.file_name().to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Group by calendar day of capture, newest day first.
    pub fn group_by_day(&self, entries: Vec<Snapshot>, today: NaiveDate) -> Vec<DayGroup> {
        let mut days: BTreeMap<NaiveDate, Vec<Snapshot>> = BTreeMap::new();
        for entry in entries {
            days.entry(entry.timestamp.date()).or_default().push(entry);
        }

        days.into_iter()
            .rev()
            .map(|(date, mut entries)| {
                self.sort(&mut entries);
                DayGroup {
                    date,
                    label: day_label(date, today),
                    entries,
                }
            })
            .collect()
    }

    /// Group into recency windows as seen from `now`.
    ///
    /// Every entry ends up in exactly one group; empty windows are omitted.
    pub fn group_by_recency(
        &self,
        entries: Vec<Snapshot>,
        now: DateTime<Local>,
    ) -> Vec<RecencyGroup> {
        let now = now.naive_local();
        let mut groups: Vec<RecencyGroup> = Vec::new();

        for entry in entries {
            let bucket = recency_bucket(entry.timestamp.naive(), now);
            match groups.iter_mut().find(|g| g.bucket == bucket) {
                Some(group) => group.entries.push(entry),
                None => groups.push(RecencyGroup {
                    bucket,
                    entries: vec![entry],
                }),
            }
        }

        groups.sort_by_key(|g| g.bucket.rank());
        for group in &mut groups {
            self.sort(&mut group.entries);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StorageKey, Timestamp};
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::path::Path;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn local(naive: NaiveDateTime) -> DateTime<Local> {
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    fn snap(path: &str, when: NaiveDateTime) -> Snapshot {
        let path = PathBuf::from(path);
        let key = StorageKey::for_path(&path);
        let dir = Path::new("/store").join(key.as_str());
        let basename = path.file_name().unwrap().to_string_lossy().into_owned();
        Snapshot::locate(path, key, Timestamp::from_naive(when), &dir, &basename)
    }

    #[test]
    fn buckets_follow_priority_order() {
        // Wednesday
        let now = at(2024, 5, 15, 12, 0);
        assert_eq!(recency_bucket(at(2024, 5, 15, 11, 30), now), RecencyBucket::LastHour);
        assert_eq!(recency_bucket(at(2024, 5, 15, 12, 30), now), RecencyBucket::LastHour);
        assert_eq!(recency_bucket(at(2024, 5, 15, 8, 0), now), RecencyBucket::Today);
        assert_eq!(recency_bucket(at(2024, 5, 14, 23, 59), now), RecencyBucket::Yesterday);
        assert_eq!(recency_bucket(at(2024, 5, 13, 0, 0), now), RecencyBucket::ThisWeek);
        assert_eq!(recency_bucket(at(2024, 5, 6, 9, 0), now), RecencyBucket::LastWeek);
        assert_eq!(recency_bucket(at(2024, 5, 2, 9, 0), now), RecencyBucket::ThisMonth);
        assert_eq!(
            recency_bucket(at(2024, 4, 30, 9, 0), now),
            RecencyBucket::Month { year: 2024, month: 4 }
        );
        assert_eq!(
            recency_bucket(at(2023, 12, 1, 0, 0), now),
            RecencyBucket::Month { year: 2023, month: 12 }
        );
    }

    #[test]
    fn yesterday_wins_over_last_week_on_monday() {
        // Monday: yesterday is Sunday of the previous week
        let now = at(2024, 5, 13, 10, 0);
        assert_eq!(recency_bucket(at(2024, 5, 12, 10, 0), now), RecencyBucket::Yesterday);
        assert_eq!(recency_bucket(at(2024, 5, 11, 10, 0), now), RecencyBucket::LastWeek);
    }

    #[test]
    fn last_week_before_this_month_on_the_first() {
        // Saturday the 1st
        let now = at(2024, 6, 1, 10, 0);
        assert_eq!(recency_bucket(at(2024, 5, 29, 10, 0), now), RecencyBucket::ThisWeek);
        assert_eq!(recency_bucket(at(2024, 5, 22, 10, 0), now), RecencyBucket::LastWeek);
        assert_eq!(
            recency_bucket(at(2024, 5, 10, 10, 0), now),
            RecencyBucket::Month { year: 2024, month: 5 }
        );
    }

    #[test]
    fn recency_grouping_partitions_input() {
        let nows = [
            at(2024, 5, 15, 12, 0),
            at(2024, 5, 13, 0, 30),
            at(2024, 6, 1, 0, 0),
            at(2024, 12, 31, 23, 59),
            at(2025, 1, 1, 0, 10),
        ];
        for now in nows {
            let entries: Vec<Snapshot> = (0..800)
                .map(|i| snap(&format!("/p/f{i}.txt"), now - Duration::hours(i * 3 - 24)))
                .collect();
            let total = entries.len();

            let groups = HistoryQuery::new().group_by_recency(entries, local(now));

            let mut seen = HashSet::new();
            for group in &groups {
                assert!(!group.entries.is_empty());
                for entry in &group.entries {
                    assert!(seen.insert(entry.content_path.clone()), "duplicate entry");
                }
            }
            assert_eq!(seen.len(), total);

            let buckets: HashSet<_> = groups.iter().map(|g| g.bucket).collect();
            assert_eq!(buckets.len(), groups.len(), "bucket listed twice");
        }
    }

    #[test]
    fn recency_groups_are_ordered() {
        let now = at(2024, 5, 15, 12, 0);
        let entries = vec![
            snap("/p/a.txt", at(2024, 2, 1, 0, 0)),
            snap("/p/b.txt", at(2024, 5, 15, 11, 59)),
            snap("/p/c.txt", at(2024, 4, 1, 0, 0)),
            snap("/p/d.txt", at(2024, 5, 14, 1, 0)),
        ];
        let groups = HistoryQuery::new().group_by_recency(entries, local(now));
        let labels: Vec<_> = groups.iter().map(|g| g.label()).collect();
        assert_eq!(labels, ["Last hour", "Yesterday", "April 2024", "February 2024"]);
    }

    #[test]
    fn day_groups_are_labelled_and_newest_first() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let entries = vec![
            snap("/p/a.txt", at(2024, 5, 13, 9, 0)),
            snap("/p/b.txt", at(2024, 5, 15, 9, 0)),
            snap("/p/c.txt", at(2024, 5, 14, 9, 0)),
            snap("/p/d.txt", at(2024, 5, 15, 10, 0)),
        ];
        let groups = HistoryQuery::new().group_by_day(entries, today);

        let labels: Vec<_> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, ["Today", "Yesterday", "Monday, May 13, 2024"]);
        let today_names: Vec<_> = groups[0].entries.iter().map(|s| s.file_name()).collect();
        assert_eq!(today_names, ["d.txt", "b.txt"]);
    }

    #[test]
    fn sort_breaks_timestamp_ties_by_display_path() {
        let when = at(2024, 5, 15, 9, 0);
        let mut entries = vec![
            snap("/w/src/z.rs", when),
            snap("/w/src/a.rs", when),
            snap("/w/old.rs", at(2024, 5, 1, 9, 0)),
        ];

        let query = HistoryQuery::new().with_workspace_root("/w");
        query.sort(&mut entries);
        let paths: Vec<_> = entries.iter().map(|s| query.display_path(s)).collect();
        assert_eq!(paths, ["src/a.rs", "src/z.rs", "old.rs"]);

        let query = query.with_sort(SortOrder::OldestFirst);
        query.sort(&mut entries);
        let paths: Vec<_> = entries.iter().map(|s| query.display_path(s)).collect();
        assert_eq!(paths, ["old.rs", "src/a.rs", "src/z.rs"]);

        let query = query.with_sort(SortOrder::ByPath);
        query.sort(&mut entries);
        let paths: Vec<_> = entries.iter().map(|s| query.display_path(s)).collect();
        assert_eq!(paths, ["old.rs", "src/a.rs", "src/z.rs"]);
    }

    #[test]
    fn display_path_outside_workspace_is_absolute() {
        let query = HistoryQuery::new().with_workspace_root("/w");
        let inside = snap("/w/src/lib.rs", at(2024, 1, 1, 0, 0));
        let outside = snap("/etc/hosts", at(2024, 1, 1, 0, 0));
        assert_eq!(query.display_path(&inside), "src/lib.rs");
        assert_eq!(query.display_path(&outside), "/etc/hosts");
    }

    #[test]
    fn filter_is_case_insensitive_on_path_or_name() {
        let when = at(2024, 5, 15, 9, 0);
        let entries = vec![
            snap("/w/src/Parser.rs", when),
            snap("/w/docs/guide.md", when),
            snap("/w/SRC-notes/todo.txt", when),
        ];
        let query = HistoryQuery::new().with_workspace_root("/w");

        let found = query.filter(entries.clone(), Some("PARSER"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name(), "Parser.rs");

        let found = query.filter(entries.clone(), Some("src"));
        assert_eq!(found.len(), 2);

        assert_eq!(query.filter(entries.clone(), None), entries);
        assert_eq!(query.filter(entries.clone(), Some("")), entries);
        assert_eq!(query.filter(entries.clone(), Some("   ")), entries);
        assert!(query.filter(entries, Some("nothing-like-this")).is_empty());
    }

    #[test]
    fn day_label_formats_older_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let new_years_eve = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(day_label(new_years_eve, today), "Yesterday");
        let earlier = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        assert_eq!(day_label(earlier, today), "Monday, December 25, 2023");
    }
}
