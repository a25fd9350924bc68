//! Google Sheets mirror.
//!
//! Copies the workbook sheets to a Google spreadsheet via the Sheets v4 REST
//! API: missing tabs are added in one `batchUpdate`, then every tab is
//! cleared and rewritten from `A1`. The caller supplies a valid OAuth access
//! token.

use crate::error::{Result, TrackerError};
use crate::workbook::{CellValue, SheetData};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Sheets API base URL
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Columns cleared before a tab is rewritten
const CLEAR_COLUMNS: &str = "A1:ZZ";

/// Google Sheets API client for one spreadsheet
pub struct SheetsClient {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<Value>>,
}

impl SheetsClient {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
        api_base: Option<&str>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TrackerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.unwrap_or(SHEETS_API_BASE).trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
        })
    }

    /// Mirror `sheets` into the spreadsheet, replacing each tab's content.
    pub async fn sync(&self, sheets: &[SheetData]) -> Result<()> {
        if sheets.is_empty() {
            return Err(TrackerError::Sheets("No sheets to sync".to_string()));
        }

        let existing = self.sheet_titles().await?;
        let missing: Vec<&str> = sheets
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !existing.contains(*name))
            .collect();
        if !missing.is_empty() {
            self.add_sheets(&missing).await?;
        }

        for sheet in sheets {
            self.clear_sheet(&sheet.name).await?;
            self.write_sheet(sheet).await?;
            info!(sheet = %sheet.name, rows = sheet.rows.len(), "Updated remote sheet");
        }
        Ok(())
    }

    async fn sheet_titles(&self) -> Result<HashSet<String>> {
        let url = format!("{}/spreadsheets/{}", self.api_base, self.spreadsheet_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?;
        let body: SpreadsheetResponse = check_status(response).await?.json().await?;
        Ok(body.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn add_sheets(&self, titles: &[&str]) -> Result<()> {
        debug!(?titles, "Adding missing sheets");
        let url = format!("{}/spreadsheets/{}:batchUpdate", self.api_base, self.spreadsheet_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&add_sheets_request(titles))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn clear_sheet(&self, name: &str) -> Result<()> {
        let range = clear_range(name);
        let url = format!(
            "{}/spreadsheets/{}/values/{}:clear",
            self.api_base,
            self.spreadsheet_id,
            urlencoding::encode(&range)
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({}))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn write_sheet(&self, sheet: &SheetData) -> Result<()> {
        let range = anchor_range(&sheet.name);
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base,
            self.spreadsheet_id,
            urlencoding::encode(&range)
        );
        let body = ValueRange {
            range: &range,
            major_dimension: "ROWS",
            values: sheet_values(sheet),
        };
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(TrackerError::Api {
        code: status.as_u16() as i32,
        message,
    })
}

/// Quote a tab name for A1 notation.
fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn clear_range(name: &str) -> String {
    format!("{}!{}", quote_sheet_name(name), CLEAR_COLUMNS)
}

fn anchor_range(name: &str) -> String {
    format!("{}!A1", quote_sheet_name(name))
}

fn add_sheets_request(titles: &[&str]) -> Value {
    let requests: Vec<Value> = titles
        .iter()
        .map(|title| json!({ "addSheet": { "properties": { "title": title } } }))
        .collect();
    json!({ "requests": requests })
}

/// Cell grid as JSON values; empty cells become empty strings.
fn sheet_values(sheet: &SheetData) -> Vec<Vec<Value>> {
    sheet
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    CellValue::Text(s) => Value::String(s.clone()),
                    CellValue::Number(n) => json!(n),
                    CellValue::Empty => Value::String(String::new()),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_quote_sheet_names() {
        assert_eq!(clear_range("Citation Data"), "'Citation Data'!A1:ZZ");
        assert_eq!(anchor_range("Metrics History"), "'Metrics History'!A1");
        assert_eq!(anchor_range("Ada's"), "'Ada''s'!A1");
    }

    #[test]
    fn test_add_sheets_request_body() {
        let body = add_sheets_request(&["Citation Data", "Metrics History"]);
        assert_eq!(body["requests"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(body["requests"][1]["addSheet"]["properties"]["title"], "Metrics History");
    }

    #[test]
    fn test_sheet_values_keep_grid_shape() {
        let sheet = SheetData {
            name: "Citation Data".to_string(),
            rows: vec![
                vec![CellValue::Text("Title".to_string()), CellValue::Text("citations_2024-01-01".to_string())],
                vec![CellValue::Text("Paper".to_string()), CellValue::Empty],
                vec![CellValue::Text("Other".to_string()), CellValue::Number(12)],
            ],
        };
        let values = sheet_values(&sheet);
        assert_eq!(values.len(), 3);
        assert_eq!(values[1][1], json!(""));
        assert_eq!(values[2][1], json!(12));
    }

    #[tokio::test]
    async fn test_sync_rejects_empty_input() {
        let client = SheetsClient::new("sheet-id", "token", Some("http://127.0.0.1:9")).expect("client");
        assert!(matches!(client.sync(&[]).await, Err(TrackerError::Sheets(_))));
    }
}
