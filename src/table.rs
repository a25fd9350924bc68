//! Per-paper citation time series.
//!
//! A [`CitationTable`] holds one [`PublicationRecord`] per normalized title.
//! Each record maps observation dates to the citation count seen that day.
//! A date absent from a record means the paper was not observed on that date,
//! which is different from an observed count of zero.

use crate::title::normalize_title;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A single paper and its citation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// Title as first seen, used for output
    pub display_title: String,
    /// Join key derived from the title
    pub normalized_title: String,
    /// Citation count per observation date
    pub citations_by_date: BTreeMap<NaiveDate, u64>,
}

impl PublicationRecord {
    /// Create a record observed once.
    pub fn new(display_title: impl Into<String>, date: NaiveDate, citations: u64) -> Self {
        let display_title = display_title.into();
        let normalized_title = normalize_title(&display_title);
        let mut citations_by_date = BTreeMap::new();
        citations_by_date.insert(date, citations);
        Self {
            display_title,
            normalized_title,
            citations_by_date,
        }
    }

    /// Citation count observed on `date`, if any.
    pub fn citations_on(&self, date: NaiveDate) -> Option<u64> {
        self.citations_by_date.get(&date).copied()
    }
}

/// All tracked papers, keyed by normalized title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationTable {
    records: BTreeMap<String, PublicationRecord>,
}

impl CitationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by any spelling of its title.
    pub fn get(&self, title: &str) -> Option<&PublicationRecord> {
        self.records.get(&normalize_title(title))
    }

    /// Records in normalized-title order.
    pub fn records(&self) -> impl Iterator<Item = &PublicationRecord> {
        self.records.values()
    }

    /// Insert a record loaded from storage.
    ///
    /// If a record with the same normalized title already exists, the existing
    /// display title is kept and only dates it does not have yet are filled in.
    /// Records without any observation are ignored.
    pub fn insert_loaded(&mut self, record: PublicationRecord) {
        if record.citations_by_date.is_empty() {
            debug!(title = %record.display_title, "Dropping record without observations");
            return;
        }
        match self.records.get_mut(&record.normalized_title) {
            Some(existing) => {
                for (date, count) in record.citations_by_date {
                    existing.citations_by_date.entry(date).or_insert(count);
                }
            }
            None => {
                self.records.insert(record.normalized_title.clone(), record);
            }
        }
    }

    /// Every observation date present in any record, ascending.
    pub fn observation_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .records
            .values()
            .flat_map(|r| r.citations_by_date.keys().copied())
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Citation counts on `date` for every record, unobserved counted as 0.
    pub fn counts_on(&self, date: NaiveDate) -> Vec<u64> {
        self.records
            .values()
            .map(|r| r.citations_on(date).unwrap_or(0))
            .collect()
    }

    /// Records ordered for output: most cited on `date` first, unobserved last.
    pub fn ranked_by(&self, date: NaiveDate) -> Vec<&PublicationRecord> {
        let mut ranked: Vec<&PublicationRecord> = self.records.values().collect();
        // Stable sort keeps normalized-title order among ties.
        ranked.sort_by(|a, b| b.citations_on(date).cmp(&a.citations_on(date)));
        ranked
    }
}

/// Merge a freshly fetched snapshot into the historical table.
///
/// Full outer join on normalized title. Existing records keep their display
/// title; the count for `date` is set (or overwritten) for every fetched paper.
/// Records missing from `fetched` are kept without a value for `date`.
/// With no existing table this is a first run.
pub fn merge_citations(
    existing: Option<CitationTable>,
    fetched: &BTreeMap<String, u64>,
    date: NaiveDate,
) -> CitationTable {
    let mut table = existing.unwrap_or_default();
    let mut added = 0usize;
    let mut updated = 0usize;

    for (display_title, &count) in fetched {
        let key = normalize_title(display_title);
        match table.records.get_mut(&key) {
            Some(record) => {
                record.citations_by_date.insert(date, count);
                updated += 1;
            }
            None => {
                table
                    .records
                    .insert(key, PublicationRecord::new(display_title.clone(), date, count));
                added += 1;
            }
        }
    }

    debug!(%date, added, updated, total = table.len(), "Merged citation snapshot");
    table
}
