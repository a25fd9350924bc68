//! Metrics history across runs.

use crate::metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to do when a snapshot for an already recorded date is appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateDatePolicy {
    /// Keep earlier rows for the date and add another one
    #[default]
    Append,
    /// Drop earlier rows for the date before adding the new one
    Replace,
}

/// Snapshots ordered ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsHistory {
    snapshots: Vec<MetricsSnapshot>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from rows in any order.
    pub fn from_snapshots(mut snapshots: Vec<MetricsSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.date);
        Self { snapshots }
    }

    pub fn snapshots(&self) -> &[MetricsSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.snapshots.last()
    }

    /// Insert `snapshot` and keep the history sorted by date.
    ///
    /// Rows sharing a date stay in insertion order.
    pub fn append(mut self, snapshot: MetricsSnapshot, policy: DuplicateDatePolicy) -> Self {
        if policy == DuplicateDatePolicy::Replace {
            let before = self.snapshots.len();
            self.snapshots.retain(|s| s.date != snapshot.date);
            let removed = before - self.snapshots.len();
            if removed > 0 {
                debug!(date = %snapshot.date, removed, "Replaced metrics rows for date");
            }
        }
        self.snapshots.push(snapshot);
        self.snapshots.sort_by_key(|s| s.date);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot(day: u32, total: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            date: NaiveDate::from_ymd_opt(2024, 1, day).expect("valid date"),
            total_citations: total,
            h_index: 1,
            i10_index: 0,
            paper_count: 1,
        }
    }

    fn is_sorted(history: &MetricsHistory) -> bool {
        history.snapshots().windows(2).all(|w| w[0].date <= w[1].date)
    }

    #[test]
    fn test_stays_sorted_after_appends() {
        let mut history = MetricsHistory::new();
        for day in [5, 1, 9, 3, 3, 7] {
            history = history.append(snapshot(day, day as u64), DuplicateDatePolicy::Append);
            assert!(is_sorted(&history));
        }
        assert_eq!(history.len(), 6);
        assert_eq!(history.latest().map(|s| s.total_citations), Some(9));
    }

    #[test]
    fn test_append_keeps_duplicate_dates() {
        let history = MetricsHistory::new()
            .append(snapshot(2, 10), DuplicateDatePolicy::Append)
            .append(snapshot(2, 11), DuplicateDatePolicy::Append);
        let totals: Vec<u64> = history.snapshots().iter().map(|s| s.total_citations).collect();
        assert_eq!(totals, vec![10, 11]);
    }

    #[test]
    fn test_replace_overwrites_same_date() {
        let history = MetricsHistory::from_snapshots(vec![snapshot(4, 1), snapshot(2, 10), snapshot(2, 12)])
            .append(snapshot(2, 15), DuplicateDatePolicy::Replace);
        assert_eq!(history.len(), 2);
        assert_eq!(history.snapshots()[0].total_citations, 15);
        assert_eq!(history.snapshots()[1].total_citations, 1);
    }
}
