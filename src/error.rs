//! Custom error types for scholar-citations.
//!
//! Every fallible library function returns `Result<T, TrackerError>`.
//! Which variants are fatal for a run is decided in [`crate::pipeline`].

use thiserror::Error;

/// Main error type for citation tracking operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The profile identifier could not be extracted from the configured input
    #[error("Cannot resolve profile: {0}")]
    ProfileResolution(String),

    /// The profile page did not contain an author profile
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// CAPTCHA detected
    #[error("CAPTCHA detected, please refresh cookies")]
    Captcha,

    /// Rate limited by the profile source
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote service returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message or response body
        message: String,
    },

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Spreadsheet file could not be read or written
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// Remote spreadsheet sync failed
    #[error("Sheets sync error: {0}")]
    Sheets(String),

    /// Notification email could not be built or sent
    #[error("Email error: {0}")]
    Email(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<calamine::XlsxError> for TrackerError {
    fn from(e: calamine::XlsxError) -> Self {
        TrackerError::Workbook(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for TrackerError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        TrackerError::Workbook(e.to_string())
    }
}

/// Result type alias using `TrackerError`
pub type Result<T> = std::result::Result<T, TrackerError>;

