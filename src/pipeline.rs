//! One tracking run: fetch, merge, compute, persist, then the optional
//! Google Sheets mirror and summary email.
//!
//! Only a failure to locate the author or to write the local workbook fails
//! the run. An unreadable workbook is treated as a first run, and the mirror
//! and email are best effort.

use crate::config::Config;
use crate::error::Result;
use crate::history::MetricsHistory;
use crate::metrics::MetricsSnapshot;
use crate::notify::{send_summary, SmtpSettings};
use crate::scholar::{resolve_profile_id, PublicationSource};
use crate::sheets::SheetsClient;
use crate::table::merge_citations;
use crate::workbook::{citation_sheet, load_workbook, metrics_sheet, output_filename, save_workbook, SheetData, StoredData};
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use tracing::{info, warn};

/// Outcome of a best-effort side channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not configured
    Disabled,
    Done,
    Failed(String),
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub author_name: String,
    pub date: NaiveDate,
    pub output_path: PathBuf,
    pub fetched_count: usize,
    /// Reasons for every publication row that was skipped
    pub skipped: Vec<String>,
    pub snapshot: MetricsSnapshot,
    /// Rows now in the metrics history
    pub history_len: usize,
    pub sheets_sync: ChannelStatus,
    pub email: ChannelStatus,
}

/// Run the full pipeline against `source`.
pub async fn run<S: PublicationSource>(config: &Config, source: &S) -> Result<RunSummary> {
    config.validate()?;

    let profile = resolve_profile_id(&config.profile)?;
    info!(profile = %profile, "Resolved profile");

    let publications = source.fetch_author_publications(&profile).await?;
    let date = config.run_date.unwrap_or_else(|| Local::now().date_naive());
    let output_path = config.output_dir.join(output_filename(&publications.author_name));

    let stored = match load_workbook(&output_path) {
        Ok(stored) => stored,
        Err(e) => {
            warn!(path = %output_path.display(), error = %e, "Existing workbook unreadable, starting fresh");
            StoredData::default()
        }
    };

    let table = merge_citations(stored.table, &publications.citations(), date);
    let snapshot = MetricsSnapshot::from_table(&table, date);
    let history = stored
        .history
        .unwrap_or_else(MetricsHistory::new)
        .append(snapshot.clone(), config.duplicate_dates);

    let sheets = [citation_sheet(&table, date), metrics_sheet(&history)];
    std::fs::create_dir_all(&config.output_dir)?;
    save_workbook(&output_path, &sheets)?;

    let sheets_sync = mirror_to_sheets(config, &sheets).await;
    let email = email_summary(config, &publications.author_name, &snapshot).await;

    Ok(RunSummary {
        author_name: publications.author_name.clone(),
        date,
        output_path,
        fetched_count: publications.fetched_count(),
        skipped: publications.skip_reasons(),
        snapshot,
        history_len: history.len(),
        sheets_sync,
        email,
    })
}

async fn mirror_to_sheets(config: &Config, sheets: &[SheetData]) -> ChannelStatus {
    let Some(sheets_config) = &config.sheets else {
        return ChannelStatus::Disabled;
    };

    let result = async {
        let client = SheetsClient::new(
            sheets_config.spreadsheet_id.as_str(),
            sheets_config.access_token.as_str(),
            sheets_config.api_base.as_deref(),
        )?;
        client.sync(sheets).await
    }
    .await;

    match result {
        Ok(()) => {
            info!(spreadsheet = %sheets_config.spreadsheet_id, "Mirrored workbook to Google Sheets");
            ChannelStatus::Done
        }
        Err(e) => {
            warn!(error = %e, "Google Sheets sync failed");
            ChannelStatus::Failed(e.to_string())
        }
    }
}

async fn email_summary(config: &Config, author_name: &str, snapshot: &MetricsSnapshot) -> ChannelStatus {
    let Some(email) = &config.email else {
        return ChannelStatus::Disabled;
    };

    let settings = SmtpSettings {
        host: email.smtp_host.clone(),
        port: email.smtp_port,
        username: email.username.clone(),
        password: email.password.clone(),
        from: email.from.clone().unwrap_or_else(|| email.username.clone()),
    };

    match send_summary(&settings, &email.to, author_name, snapshot).await {
        Ok(()) => ChannelStatus::Done,
        Err(e) => {
            warn!(error = %e, "Sending summary email failed");
            ChannelStatus::Failed(e.to_string())
        }
    }
}
