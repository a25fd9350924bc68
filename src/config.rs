//! Run configuration.
//!
//! Loaded from an optional JSON file; the CLI then overrides individual
//! fields. Nothing in the core modules reads configuration directly.

use crate::error::{Result, TrackerError};
use crate::history::DuplicateDatePolicy;
use crate::scholar::{FetchOptions, DEFAULT_PROFILE_URL, MAX_DELAY_SECS, MAX_PAGE_SIZE};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Google Sheets mirror settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// OAuth bearer token with the spreadsheets scope
    pub access_token: String,
    /// Override for the Sheets API base URL
    pub api_base: Option<String>,
}

/// Summary email settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Sender address, defaults to `username`
    pub from: Option<String>,
    pub to: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from: None,
            to: String::new(),
        }
    }
}

/// Everything one run needs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Profile URL or bare Scholar user id
    pub profile: String,
    /// Directory holding the workbook
    pub output_dir: PathBuf,
    /// Custom base URL for mirror sites
    pub scholar_base_url: Option<String>,
    pub proxy: Option<String>,
    pub page_size: u32,
    pub max_pages: u32,
    pub delay_min_secs: f64,
    pub delay_max_secs: f64,
    /// Observation date, defaults to today
    pub run_date: Option<NaiveDate>,
    pub duplicate_dates: DuplicateDatePolicy,
    /// Cookie file, defaults to `~/.scholar_citations_cookies.json`
    pub cookie_file: Option<PathBuf>,
    pub sheets: Option<SheetsConfig>,
    pub email: Option<EmailConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE_URL.to_string(),
            output_dir: PathBuf::from("."),
            scholar_base_url: None,
            proxy: None,
            page_size: MAX_PAGE_SIZE,
            max_pages: 50,
            delay_min_secs: 2.0,
            delay_max_secs: 5.0,
            run_date: None,
            duplicate_dates: DuplicateDatePolicy::Append,
            cookie_file: None,
            sheets: None,
            email: None,
        }
    }
}

impl Config {
    /// Read a JSON config file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.profile.trim().is_empty() {
            return Err(TrackerError::Config("profile must not be empty".to_string()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(TrackerError::Config(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.max_pages == 0 {
            return Err(TrackerError::Config("max_pages must be at least 1".to_string()));
        }
        // NaN fails every comparison, so it is rejected here too.
        if !(self.delay_min_secs >= 0.0
            && self.delay_min_secs <= self.delay_max_secs
            && self.delay_max_secs <= MAX_DELAY_SECS)
        {
            return Err(TrackerError::Config(format!(
                "invalid delay bounds {}..{} (allowed 0..{})",
                self.delay_min_secs, self.delay_max_secs, MAX_DELAY_SECS
            )));
        }
        if let Some(sheets) = &self.sheets {
            if sheets.spreadsheet_id.is_empty() || sheets.access_token.is_empty() {
                return Err(TrackerError::Config(
                    "sheets sync needs spreadsheet_id and access_token".to_string(),
                ));
            }
        }
        if let Some(email) = &self.email {
            if email.smtp_host.is_empty() || email.username.is_empty() || email.to.is_empty() {
                return Err(TrackerError::Config(
                    "email needs smtp_host, username and to".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Fetch options carrying the given cookie header.
    pub fn fetch_options(&self, cookie_header: String) -> FetchOptions {
        FetchOptions {
            base_url: self.scholar_base_url.clone(),
            proxy: self.proxy.clone(),
            page_size: self.page_size,
            max_pages: self.max_pages,
            delay_min_secs: self.delay_min_secs,
            delay_max_secs: self.delay_max_secs,
            cookie_header,
        }
    }
}
