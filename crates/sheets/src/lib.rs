//! Google Sheets client for Rust
//!
//! This crate provides the small part of the Sheets v4 API the autoshop
//! client uses to treat a spreadsheet as a set of tables:
//!
//! - reading a value range (`values.get`)
//! - appending a row (`values.append`)
//! - overwriting a row (`values.update`)
//! - structural changes such as deleting rows or adding sheets (`batchUpdate`)
//!
//! Every request goes through [`AuthorizedClient`], so an expired token is
//! refreshed once and the request retried before an error is reported.

use autoshop_rust_auth::{AuthError, AuthorizedClient};
use log::{debug, info};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

/// Default API host
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Details of a Google API error body (`{"error": {...}}`)
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GoogleApiErrorDetails {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub status: Option<String>,
}

impl fmt::Display for GoogleApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(status) = &self.status {
            parts.push(format!("Status: {}", status));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Deserialize)]
struct GoogleApiErrorBody {
    error: GoogleApiErrorDetails,
}

/// Error type
#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: GoogleApiErrorDetails,
        status: StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError { message: String, status: StatusCode },

    #[error("Auth error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl SheetsError {
    /// Whether the request never got an answer from the API
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SheetsError::NetworkError(_) | SheetsError::AuthError(AuthError::NetworkError(_))
        )
    }

    /// Whether the user has to sign in again
    pub fn is_reauthentication_required(&self) -> bool {
        matches!(
            self,
            SheetsError::AuthError(AuthError::ReauthenticationRequired(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, SheetsError>;

/// A `values` range
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// Result of a write to a value range
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    pub updated_range: Option<String>,
    pub updated_rows: Option<i64>,
    pub updated_columns: Option<i64>,
    pub updated_cells: Option<i64>,
}

/// Result of `values.append`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendValuesResponse {
    pub table_range: Option<String>,
    #[serde(default)]
    pub updates: UpdateValuesResponse,
}

impl AppendValuesResponse {
    /// The 1-based row number the appended row landed on, when the API reported it
    pub fn appended_row(&self) -> Option<usize> {
        let range = self.updates.updated_range.as_deref()?;
        let cells = range.rsplit('!').next()?;
        let first = cells.split(':').next()?;
        first
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse()
            .ok()
    }
}

/// Properties of one sheet (tab) in the spreadsheet
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: i64,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

/// Convert a 1-based column index to its letter form (1 → A, 27 → AA)
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Prefix a cell range with a sheet title, quoting the title when needed
pub fn a1_range(sheet: &str, cells: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{}!{}", sheet, cells)
    } else {
        format!("'{}'!{}", sheet.replace('\'', "''"), cells)
    }
}

/// Render a cell value the way it is shown in the sheet
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Build a `deleteDimension` request removing rows `[start, end)` (0-based)
pub fn delete_rows_request(sheet_id: i64, start_index: usize, end_index: usize) -> Value {
    json!({
        "deleteDimension": {
            "range": {
                "sheetId": sheet_id,
                "dimension": "ROWS",
                "startIndex": start_index,
                "endIndex": end_index
            }
        }
    })
}

/// Build an `addSheet` request
pub fn add_sheet_request(title: &str) -> Value {
    json!({
        "addSheet": {
            "properties": { "title": title }
        }
    })
}

/// Client for one spreadsheet
#[derive(Clone)]
pub struct SheetsClient {
    base_url: String,
    spreadsheet_id: String,
    client: AuthorizedClient,
    sheet_ids: Arc<RwLock<HashMap<String, i64>>>,
}

impl SheetsClient {
    /// Create a client against the public API host
    pub fn new(spreadsheet_id: &str, client: AuthorizedClient) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, spreadsheet_id, client)
    }

    /// Create a client against a custom host
    pub fn with_base_url(base_url: &str, spreadsheet_id: &str, client: AuthorizedClient) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            client,
            sheet_ids: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn spreadsheet_url(&self, suffix: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SheetsError::InvalidParameters(format!("Invalid base URL: {}", self.base_url))
            })?;
            segments.pop_if_empty().push("v4").push("spreadsheets");
            match suffix {
                Some(suffix) => segments.push(&format!("{}{}", self.spreadsheet_id, suffix)),
                None => segments.push(&self.spreadsheet_id),
            };
        }
        Ok(url)
    }

    fn values_url(&self, range: &str, action: Option<&str>) -> Result<Url> {
        let mut url = self.spreadsheet_url(None)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SheetsError::InvalidParameters(format!("Invalid base URL: {}", self.base_url))
            })?;
            segments.push("values");
            match action {
                Some(action) => segments.push(&format!("{}:{}", range, action)),
                None => segments.push(range),
            };
        }
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await?;
        match serde_json::from_str::<GoogleApiErrorBody>(&error_text) {
            Ok(body) => Err(SheetsError::ApiError {
                details: body.error,
                status,
            }),
            Err(_) => Err(SheetsError::UnparsedApiError {
                message: error_text,
                status,
            }),
        }
    }

    /// Read a range. Cells are rendered as strings; trailing empty cells
    /// are omitted by the API, so rows may be ragged.
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range, None)?;
        debug!("GET values {}", range);

        let response = self.client.send(|http| http.get(url.clone())).await?;
        let body: ValueRange = Self::check(response).await?.json().await?;

        Ok(body
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    /// Append rows after the last row of the table found in `range`
    pub async fn append_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<AppendValuesResponse> {
        let url = self.values_url(range, Some("append"))?;
        let body = ValueRange {
            range: None,
            major_dimension: Some("ROWS".to_string()),
            values: to_json_rows(rows),
        };
        debug!("APPEND {} row(s) to {}", rows.len(), range);

        let response = self
            .client
            .send(|http| {
                http.post(url.clone())
                    .query(&[
                        ("valueInputOption", "RAW"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&body)
            })
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Overwrite a range
    pub async fn update_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<UpdateValuesResponse> {
        let url = self.values_url(range, None)?;
        let body = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: to_json_rows(rows),
        };
        debug!("UPDATE {}", range);

        let response = self
            .client
            .send(|http| {
                http.put(url.clone())
                    .query(&[("valueInputOption", "RAW")])
                    .json(&body)
            })
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Run structural requests (`deleteDimension`, `addSheet`, ...)
    pub async fn batch_update(&self, requests: Vec<Value>) -> Result<Value> {
        let url = self.spreadsheet_url(Some(":batchUpdate"))?;
        let body = json!({ "requests": requests });

        let response = self
            .client
            .send(|http| http.post(url.clone()).json(&body))
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// List the sheets of the spreadsheet and refresh the title → id cache
    pub async fn sheets(&self) -> Result<Vec<SheetProperties>> {
        let url = self.spreadsheet_url(None)?;

        let response = self
            .client
            .send(|http| {
                http.get(url.clone())
                    .query(&[("fields", "sheets.properties")])
            })
            .await?;
        let metadata: SpreadsheetMetadata = Self::check(response).await?.json().await?;

        let sheets: Vec<SheetProperties> =
            metadata.sheets.into_iter().map(|s| s.properties).collect();

        let mut ids = self.sheet_ids.write().await;
        ids.clear();
        for sheet in &sheets {
            ids.insert(sheet.title.clone(), sheet.sheet_id);
        }

        Ok(sheets)
    }

    /// Numeric id of a sheet, looked up once and then memoised
    pub async fn sheet_id(&self, title: &str) -> Result<i64> {
        if let Some(id) = self.sheet_ids.read().await.get(title) {
            return Ok(*id);
        }

        self.sheets()
            .await?
            .into_iter()
            .find(|s| s.title == title)
            .map(|s| s.sheet_id)
            .ok_or_else(|| SheetsError::SheetNotFound(title.to_string()))
    }

    /// Physically remove one row (1-based), shifting later rows up
    pub async fn delete_row(&self, title: &str, row_number: usize) -> Result<()> {
        if row_number < 2 {
            return Err(SheetsError::InvalidParameters(format!(
                "Refusing to delete row {} of {}",
                row_number, title
            )));
        }

        let sheet_id = self.sheet_id(title).await?;
        self.batch_update(vec![delete_rows_request(
            sheet_id,
            row_number - 1,
            row_number,
        )])
        .await?;

        info!("Deleted row {} of {}", row_number, title);
        Ok(())
    }

    /// Make sure a sheet exists and carries the given header row.
    ///
    /// Returns `true` when the sheet had to be created. An existing,
    /// non-empty header row is left untouched.
    pub async fn ensure_sheet(&self, title: &str, headers: &[&str]) -> Result<bool> {
        let exists = self.sheets().await?.iter().any(|s| s.title == title);

        if !exists {
            self.batch_update(vec![add_sheet_request(title)]).await?;
            info!("Created sheet {}", title);
        }

        let header_range = a1_range(title, "1:1");
        let current = self.get_values(&header_range).await?;
        if current.first().map(|row| row.is_empty()).unwrap_or(true) {
            let last = column_letter(headers.len().max(1));
            let range = a1_range(title, &format!("A1:{}1", last));
            let row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
            self.update_values(&range, &[row]).await?;
        }

        Ok(!exists)
    }
}

fn to_json_rows(rows: &[Vec<String>]) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| Value::String(cell.clone())).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoshop_rust_auth::StaticToken;
    use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(mock_server: &MockServer) -> SheetsClient {
        let auth = AuthorizedClient::new(reqwest::Client::new(), Arc::new(StaticToken::new("fake-token")));
        SheetsClient::with_base_url(&mock_server.uri(), "sheet-123", auth)
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(6), "F");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_a1_range_quoting() {
        assert_eq!(a1_range("Users", "A:F"), "Users!A:F");
        assert_eq!(a1_range("Sms Logs", "A1:B1"), "'Sms Logs'!A1:B1");
        assert_eq!(a1_range("Owner's", "1:1"), "'Owner''s'!1:1");
    }

    #[test]
    fn test_appended_row() {
        let response = AppendValuesResponse {
            table_range: Some("Users!A1:F3".to_string()),
            updates: UpdateValuesResponse {
                updated_range: Some("Users!A4:F4".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(response.appended_row(), Some(4));
        assert_eq!(AppendValuesResponse::default().appended_row(), None);
    }

    #[tokio::test]
    async fn test_get_values() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123/values/Users!A:F"))
            .and(header("authorization", "Bearer fake-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Users!A1:F3",
                "majorDimension": "ROWS",
                "values": [
                    ["id", "username", "active"],
                    ["u1", "ali", true],
                    ["u2", "sara", 12]
                ]
            })))
            .mount(&mock_server)
            .await;

        let rows = client(&mock_server).get_values("Users!A:F").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["u1", "ali", "true"]);
        assert_eq!(rows[2][2], "12");
    }

    #[tokio::test]
    async fn test_get_values_empty_sheet() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sheet-123/values/.*Tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Tasks!A1:Z1000",
                "majorDimension": "ROWS"
            })))
            .mount(&mock_server)
            .await;

        let rows = client(&mock_server).get_values("Tasks!A:Z").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_append_values() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-123/values/Users!A:C:append"))
            .and(query_param("valueInputOption", "RAW"))
            .and(query_param("insertDataOption", "INSERT_ROWS"))
            .and(body_json(json!({
                "majorDimension": "ROWS",
                "values": [["u3", "reza", "false"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "spreadsheetId": "sheet-123",
                "tableRange": "Users!A1:C3",
                "updates": {
                    "updatedRange": "Users!A4:C4",
                    "updatedRows": 1,
                    "updatedColumns": 3,
                    "updatedCells": 3
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let row = vec!["u3".to_string(), "reza".to_string(), "false".to_string()];
        let result = client(&mock_server)
            .append_values("Users!A:C", &[row])
            .await
            .unwrap();
        assert_eq!(result.updates.updated_rows, Some(1));
        assert_eq!(result.appended_row(), Some(4));
    }

    #[tokio::test]
    async fn test_update_values() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/sheet-123/values/Users!A3:C3"))
            .and(query_param("valueInputOption", "RAW"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "updatedRange": "Users!A3:C3",
                "updatedRows": 1
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let row = vec!["u2".to_string(), "sara".to_string(), "true".to_string()];
        let result = client(&mock_server)
            .update_values("Users!A3:C3", &[row])
            .await
            .unwrap();
        assert_eq!(result.updated_range.as_deref(), Some("Users!A3:C3"));
    }

    #[tokio::test]
    async fn test_delete_row_resolves_sheet_id_once() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123"))
            .and(query_param("fields", "sheets.properties"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [
                    { "properties": { "sheetId": 0, "title": "Users", "index": 0 } },
                    { "properties": { "sheetId": 917, "title": "Tasks", "index": 1 } }
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-123:batchUpdate"))
            .and(body_json(json!({
                "requests": [{
                    "deleteDimension": {
                        "range": { "sheetId": 917, "dimension": "ROWS", "startIndex": 2, "endIndex": 3 }
                    }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "replies": [{}] })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);
        client.delete_row("Tasks", 3).await.unwrap();
        client.delete_row("Tasks", 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_header_row_refused() {
        let mock_server = MockServer::start().await;
        let result = client(&mock_server).delete_row("Tasks", 1).await;
        assert!(matches!(result, Err(SheetsError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_unknown_sheet() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sheets": [] })))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server).sheet_id("Nope").await;
        match result {
            Err(SheetsError::SheetNotFound(title)) => assert_eq!(title, "Nope"),
            other => panic!("Expected SheetNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ensure_sheet_creates_and_writes_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sheets": [] })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-123:batchUpdate"))
            .and(body_json(json!({
                "requests": [{ "addSheet": { "properties": { "title": "Messages" } } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "replies": [{}] })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123/values/Messages!1:1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "Messages!A1:Z1" })))
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/sheet-123/values/Messages!A1:B1"))
            .and(body_json(json!({
                "range": "Messages!A1:B1",
                "majorDimension": "ROWS",
                "values": [["id", "subject"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "updatedRows": 1 })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let created = client(&mock_server)
            .ensure_sheet("Messages", &["id", "subject"])
            .await
            .unwrap();
        assert!(created);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123/values/Missing!A:B"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "Unable to parse range: Missing!A:B",
                    "status": "INVALID_ARGUMENT"
                }
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123/values/Broken!A:B"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);

        match client.get_values("Missing!A:B").await {
            Err(SheetsError::ApiError { details, status }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(details.status.as_deref(), Some("INVALID_ARGUMENT"));
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }

        match client.get_values("Broken!A:B").await {
            Err(SheetsError::UnparsedApiError { message, status }) => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("Expected UnparsedApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_static_token_requires_reauthentication() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123/values/Users!A:B"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .get_values("Users!A:B")
            .await
            .unwrap_err();
        assert!(err.is_reauthentication_required());
        assert!(!err.is_network());
    }
}
