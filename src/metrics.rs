//! Bibliometric indices.

use crate::table::CitationTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Citation threshold for the i10-index
pub const I10_THRESHOLD: u64 = 10;

/// Compute `(h_index, i10_index)` from one citation count per paper.
///
/// The h-index is the largest `h` such that `h` papers have at least `h`
/// citations each. The i10-index counts papers with at least 10 citations.
/// Empty input yields `(0, 0)`.
pub fn calculate_metrics(citations: &[u64]) -> (u64, u64) {
    let mut sorted = citations.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut h_index = 0;
    for (rank, &count) in (1u64..).zip(sorted.iter()) {
        if count >= rank {
            h_index = rank;
        } else {
            break;
        }
    }

    let i10_index = sorted.iter().filter(|&&c| c >= I10_THRESHOLD).count() as u64;

    (h_index, i10_index)
}

/// Metrics for a single run date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub date: NaiveDate,
    pub total_citations: u64,
    pub h_index: u64,
    pub i10_index: u64,
    pub paper_count: u64,
}

impl MetricsSnapshot {
    /// Summarize the `date` column of a merged table.
    ///
    /// Every record counts toward `paper_count`; papers not observed on
    /// `date` contribute 0 citations.
    pub fn from_table(table: &CitationTable, date: NaiveDate) -> Self {
        let counts = table.counts_on(date);
        let (h_index, i10_index) = calculate_metrics(&counts);
        Self {
            date,
            total_citations: counts.iter().sum(),
            h_index,
            i10_index,
            paper_count: table.len() as u64,
        }
    }
}
