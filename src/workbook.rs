//! Excel workbook persistence.
//!
//! The workbook has two sheets:
//!
//! - `Citation Data`: a `Title` column holding display titles, then one
//!   `citations_<YYYY-MM-DD>` column per observation date, oldest first.
//! - `Metrics History`: `Date`, `Total Citations`, `h-index`, `i10-index`,
//!   `Total Papers`, one row per run, oldest first.
//!
//! Both sheets are first built as [`SheetData`] so the same content can be
//! written to disk and mirrored to Google Sheets.

use crate::error::{Result, TrackerError};
use crate::history::MetricsHistory;
use crate::metrics::MetricsSnapshot;
use crate::table::{CitationTable, PublicationRecord};
use crate::title::normalize_optional_title;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

pub const CITATION_SHEET: &str = "Citation Data";
pub const METRICS_SHEET: &str = "Metrics History";
pub const TITLE_HEADER: &str = "Title";
pub const METRICS_HEADERS: [&str; 5] = ["Date", "Total Citations", "h-index", "i10-index", "Total Papers"];

const CITATION_COLUMN_PREFIX: &str = "citations_";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Characters replaced by `_` when an author name becomes a file name
const UNSAFE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', ' '];

/// Workbook file name for an author: `scholar_citations_<name>.xlsx`
pub fn output_filename(author_name: &str) -> String {
    let safe: String = author_name
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    format!("scholar_citations_{}.xlsx", safe)
}

/// Column header for an observation date
pub fn citation_column(date: NaiveDate) -> String {
    format!("{}{}", CITATION_COLUMN_PREFIX, date.format(DATE_FORMAT))
}

/// Observation date of a `citations_<date>` header
pub fn parse_citation_column(header: &str) -> Option<NaiveDate> {
    header
        .trim()
        .strip_prefix(CITATION_COLUMN_PREFIX)
        .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
}

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Number(u64),
    Empty,
}

impl CellValue {
    fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }
}

/// Sheet content: the first row is the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetData {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

/// `Citation Data` sheet, rows ranked by citations on `current_date`.
pub fn citation_sheet(table: &CitationTable, current_date: NaiveDate) -> SheetData {
    let dates = table.observation_dates();

    let mut header = vec![CellValue::text(TITLE_HEADER)];
    header.extend(dates.iter().map(|d| CellValue::Text(citation_column(*d))));

    let mut rows = vec![header];
    for record in table.ranked_by(current_date) {
        let mut row = vec![CellValue::Text(record.display_title.clone())];
        row.extend(dates.iter().map(|d| match record.citations_on(*d) {
            Some(count) => CellValue::Number(count),
            None => CellValue::Empty,
        }));
        rows.push(row);
    }

    SheetData {
        name: CITATION_SHEET.to_string(),
        rows,
    }
}

/// `Metrics History` sheet
pub fn metrics_sheet(history: &MetricsHistory) -> SheetData {
    let mut rows = vec![METRICS_HEADERS.iter().map(|h| CellValue::text(*h)).collect::<Vec<_>>()];
    for s in history.snapshots() {
        rows.push(vec![
            CellValue::Text(s.date.format(DATE_FORMAT).to_string()),
            CellValue::Number(s.total_citations),
            CellValue::Number(s.h_index),
            CellValue::Number(s.i10_index),
            CellValue::Number(s.paper_count),
        ]);
    }
    SheetData {
        name: METRICS_SHEET.to_string(),
        rows,
    }
}

/// Write all sheets to `path`, replacing any existing file.
pub fn save_workbook(path: &Path, sheets: &[SheetData]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name.as_str())?;

        for (r, row) in sheet.rows.iter().enumerate() {
            let r = r as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    CellValue::Text(s) if r == 0 => {
                        worksheet.write_string_with_format(r, c, s.as_str(), &header_format)?;
                    }
                    CellValue::Text(s) => {
                        worksheet.write_string(r, c, s.as_str())?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(r, c, *n as f64)?;
                    }
                    CellValue::Empty => {}
                }
            }
        }
    }

    workbook.save(path)?;
    info!(path = %path.display(), sheets = sheets.len(), "Saved workbook");
    Ok(())
}

/// Previously persisted state
#[derive(Debug, Clone, Default)]
pub struct StoredData {
    /// `None` when there is no workbook yet
    pub table: Option<CitationTable>,
    /// `None` when the workbook has no metrics sheet
    pub history: Option<MetricsHistory>,
}

/// Load a workbook written by [`save_workbook`].
///
/// A missing file is not an error and yields empty [`StoredData`].
pub fn load_workbook(path: &Path) -> Result<StoredData> {
    if !path.exists() {
        debug!(path = %path.display(), "No existing workbook");
        return Ok(StoredData::default());
    }

    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names();

    let citation_name = if sheet_names.iter().any(|n| n == CITATION_SHEET) {
        CITATION_SHEET.to_string()
    } else {
        sheet_names
            .first()
            .cloned()
            .ok_or_else(|| TrackerError::Workbook(format!("{} has no sheets", path.display())))?
    };
    let table = read_citation_range(&workbook.worksheet_range(&citation_name)?)?;

    let history = if sheet_names.iter().any(|n| n == METRICS_SHEET) {
        // A damaged history must not take the citation table down with it.
        let metrics = workbook
            .worksheet_range(METRICS_SHEET)
            .map_err(TrackerError::from)
            .and_then(|range| read_metrics_range(&range));
        match metrics {
            Ok(history) => Some(history),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable metrics history");
                None
            }
        }
    } else {
        debug!(path = %path.display(), "Workbook has no metrics history");
        None
    };

    info!(
        path = %path.display(),
        papers = table.len(),
        runs = history.as_ref().map(|h| h.len()).unwrap_or(0),
        "Loaded existing workbook"
    );
    Ok(StoredData {
        table: Some(table),
        history,
    })
}

fn read_citation_range(range: &Range<Data>) -> Result<CitationTable> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| TrackerError::Workbook(format!("'{}' sheet is empty", CITATION_SHEET)))?;

    let title_col = header
        .iter()
        .position(|cell| cell_text(cell).as_deref() == Some(TITLE_HEADER))
        .unwrap_or(0);
    let date_cols: Vec<(usize, NaiveDate)> = header
        .iter()
        .enumerate()
        .filter_map(|(i, cell)| cell_text(cell).and_then(|h| parse_citation_column(&h)).map(|d| (i, d)))
        .collect();

    if date_cols.is_empty() {
        warn!(sheet = CITATION_SHEET, "No {}<date> columns, starting with an empty table", CITATION_COLUMN_PREFIX);
        return Ok(CitationTable::new());
    }

    let mut table = CitationTable::new();
    for row in rows {
        let display_title = match row.get(title_col).and_then(cell_text) {
            Some(title) => title,
            None => continue,
        };
        let normalized_title = match normalize_optional_title(Some(display_title.as_str())) {
            Some(key) if !key.is_empty() => key,
            _ => continue,
        };

        let citations_by_date: BTreeMap<NaiveDate, u64> = date_cols
            .iter()
            .filter_map(|(col, date)| row.get(*col).and_then(cell_count).map(|c| (*date, c)))
            .collect();

        table.insert_loaded(PublicationRecord {
            display_title,
            normalized_title,
            citations_by_date,
        });
    }
    Ok(table)
}

fn read_metrics_range(range: &Range<Data>) -> Result<MetricsHistory> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| TrackerError::Workbook(format!("'{}' sheet is empty", METRICS_SHEET)))?;

    let mut cols = [0usize; 5];
    for (slot, name) in cols.iter_mut().zip(METRICS_HEADERS) {
        *slot = header
            .iter()
            .position(|cell| cell_text(cell).as_deref() == Some(name))
            .ok_or_else(|| {
                TrackerError::Workbook(format!("'{}' sheet has no '{}' column", METRICS_SHEET, name))
            })?;
    }
    let [date_col, total_col, h_col, i10_col, papers_col] = cols;

    let mut snapshots = Vec::new();
    for (index, row) in rows.enumerate() {
        let count = |col: usize| row.get(col).and_then(cell_count);
        let date = row.get(date_col).and_then(cell_text).and_then(|s| parse_date_prefix(&s));
        match (date, count(total_col), count(h_col), count(i10_col), count(papers_col)) {
            (Some(date), Some(total_citations), Some(h_index), Some(i10_index), Some(paper_count)) => {
                snapshots.push(MetricsSnapshot {
                    date,
                    total_citations,
                    h_index,
                    i10_index,
                    paper_count,
                });
            }
            _ => warn!(row = index + 2, "Skipping malformed metrics history row"),
        }
    }
    Ok(MetricsHistory::from_snapshots(snapshots))
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part.
fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

/// Empty or non-numeric cells are unobserved.
fn cell_count(cell: &Data) -> Option<u64> {
    match cell {
        Data::Int(i) if *i >= 0 => Some(*i as u64),
        Data::Float(f) if f.is_finite() && *f >= 0.0 => Some(f.round() as u64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
