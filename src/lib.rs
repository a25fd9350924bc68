//! # scholar-citations
//!
//! Tracks a Google Scholar author's citation counts over time.
//!
//! Each run fetches the author's current per-paper citation counts, merges
//! them into the per-paper history kept in an Excel workbook, appends the
//! day's h-index, i10-index and totals to the metrics history, and optionally
//! mirrors the workbook to Google Sheets and emails a summary.
//!
//! ## Modules
//!
//! - [`scholar`] - Google Scholar profile fetching
//! - [`title`] - Title normalization used as the join key
//! - [`table`] - Per-paper citation time series and the merge step
//! - [`metrics`] - h-index / i10-index computation
//! - [`history`] - Metrics history across runs
//! - [`workbook`] - Excel workbook load/save
//! - [`sheets`] - Google Sheets mirror
//! - [`notify`] - Summary email
//! - [`cookies`] - Cookie persistence
//! - [`config`] - Run configuration
//! - [`pipeline`] - The end-to-end run
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholar_citations::{config::Config, pipeline, scholar::ScholarClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let client = ScholarClient::new(config.fetch_options(String::new()))?;
//!     let summary = pipeline::run(&config, &client).await?;
//!     println!("h-index: {}", summary.snapshot.h_index);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cookies;
pub mod error;
pub mod history;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scholar;
pub mod sheets;
pub mod table;
pub mod title;
pub mod workbook;

pub use error::{Result, TrackerError};
