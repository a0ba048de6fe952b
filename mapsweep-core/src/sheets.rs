// Spreadsheet access: Google Sheets v4 over REST, plus an in-memory sheet

use async_trait::async_trait;
use mapsweep_scanner::error::{Result, SweepError};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// Row-oriented access to a spreadsheet. Ranges use A1 notation
/// (`Tab!A:Z`, `Tab!1:1`, or a bare tab name).
#[async_trait]
pub trait SheetClient: Send + Sync {
    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;

    /// Overwrite the cells of `range`.
    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<()>;

    /// Insert rows after the last non-empty row of `range`.
    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Google Sheets v4 client authenticated with a bearer access token.
/// The HTTP client is built on first use.
pub struct GoogleSheetsClient {
    base_url: String,
    access_token: String,
    timeout: Duration,
    http: OnceCell<Client>,
}

impl GoogleSheetsClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://sheets.googleapis.com";

    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(30),
            http: OnceCell::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn http(&self) -> Result<&Client> {
        self.http
            .get_or_try_init(|| async {
                debug!("Initialising Sheets HTTP client");
                Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(SweepError::from)
            })
            .await
    }

    /// `<base>/v4/spreadsheets/<id>/values/<range><suffix>`
    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SweepError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SweepError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values"])
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        Err(SweepError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SheetClient for GoogleSheetsClient {
    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(spreadsheet_id, range, "")?;
        debug!("GET {}", url);
        let response = self
            .http()
            .await?
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let body: ValueRange = Self::check(response).await?.json().await?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        let url = self.values_url(spreadsheet_id, range, "")?;
        debug!("PUT {} ({} rows)", url, rows.len());
        let response = self
            .http()
            .await?
            .put(url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({ "range": range, "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        let url = self.values_url(spreadsheet_id, range, ":append")?;
        debug!("POST {} ({} rows)", url, rows.len());
        let response = self
            .http()
            .await?
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&serde_json::json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// A call recorded by [`MemorySheet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetCall {
    Get { spreadsheet_id: String, range: String },
    Update { spreadsheet_id: String, range: String, rows: usize },
    Append { spreadsheet_id: String, range: String, rows: usize },
}

/// In-memory spreadsheet keyed by (spreadsheet id, tab). Records every call
/// and can be told to fail upcoming calls.
#[derive(Debug, Default)]
pub struct MemorySheet {
    tabs: Mutex<HashMap<(String, String), Vec<Vec<String>>>>,
    calls: Mutex<Vec<SheetCall>>,
    failures: Mutex<VecDeque<SweepError>>,
}

// Row span of an A1 range, 0-based and inclusive. `None` means every row.
fn row_span(a1: &str) -> Option<(usize, usize)> {
    let (start, end) = a1.split_once(':').unwrap_or((a1, a1));
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse().ok()?;
    Some((start.max(1) - 1, end.max(start).max(1) - 1))
}

fn split_range(range: &str) -> (String, Option<(usize, usize)>) {
    match range.split_once('!') {
        Some((tab, a1)) => (tab.trim_matches('\'').to_string(), row_span(a1)),
        None => (range.to_string(), None),
    }
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, spreadsheet_id: &str, tab: &str, rows: Vec<Vec<String>>) -> Self {
        self.set_rows(spreadsheet_id, tab, rows);
        self
    }

    pub fn set_rows(&self, spreadsheet_id: &str, tab: &str, rows: Vec<Vec<String>>) {
        let mut tabs = self.tabs.lock().unwrap_or_else(|e| e.into_inner());
        tabs.insert((spreadsheet_id.to_string(), tab.to_string()), rows);
    }

    pub fn rows(&self, spreadsheet_id: &str, tab: &str) -> Vec<Vec<String>> {
        let tabs = self.tabs.lock().unwrap_or_else(|e| e.into_inner());
        tabs.get(&(spreadsheet_id.to_string(), tab.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<SheetCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make the next call fail with `error`. Queued failures are used in order.
    pub fn fail_next(&self, error: SweepError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
    }

    fn record(&self, call: SheetCall) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        match self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SheetClient for MemorySheet {
    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        self.record(SheetCall::Get {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
        })?;
        let (tab, span) = split_range(range);
        let rows = self.rows(spreadsheet_id, &tab);
        Ok(match span {
            Some((start, end)) => rows.into_iter().skip(start).take(end + 1 - start).collect(),
            None => rows,
        })
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        self.record(SheetCall::Update {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
            rows: rows.len(),
        })?;
        let (tab, span) = split_range(range);
        let start = span.map(|(start, _)| start).unwrap_or(0);

        let mut tabs = self.tabs.lock().unwrap_or_else(|e| e.into_inner());
        let sheet = tabs.entry((spreadsheet_id.to_string(), tab)).or_default();
        for (offset, row) in rows.iter().enumerate() {
            let idx = start + offset;
            if idx >= sheet.len() {
                sheet.resize(idx + 1, Vec::new());
            }
            sheet[idx] = row.clone();
        }
        Ok(())
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        self.record(SheetCall::Append {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
            rows: rows.len(),
        })?;
        let (tab, _) = split_range(range);
        let mut tabs = self.tabs.lock().unwrap_or_else(|e| e.into_inner());
        tabs.entry((spreadsheet_id.to_string(), tab))
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_values_url_encodes_range() {
        let client = GoogleSheetsClient::new("https://sheets.example.com/", "t");
        let url = client.values_url("abc", "My Tab!A:Z", "").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc/values/My%20Tab!A:Z"
        );
        let url = client.values_url("abc", "Scraped", ":append").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc/values/Scraped:append"
        );
    }

    #[tokio::test]
    async fn test_get_values_stringifies_cells() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1/values/Input!A:Z"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "Input!A1:C2",
                "majorDimension": "ROWS",
                "values": [["country_name", "city_name"], ["USA", 42, true]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::new(server.uri(), "secret");
        let rows = client.get_values("sheet-1", "Input!A:Z").await.unwrap();

        assert_eq!(rows, vec![row(&["country_name", "city_name"]), row(&["USA", "42", "true"])]);
    }

    #[tokio::test]
    async fn test_get_values_empty_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "Scraped!A1:Z1000",
                "majorDimension": "ROWS"
            })))
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::new(server.uri(), "secret");
        assert!(client.get_values("s", "Scraped!1:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_append_send_values() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/out/values/Scraped!1:1"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/out/values/Scraped:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(query_param("insertDataOption", "INSERT_ROWS"))
            .and(body_json(serde_json::json!({
                "majorDimension": "ROWS",
                "values": [["a", "b"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::new(server.uri(), "secret");
        client
            .update_values("out", "Scraped!1:1", &[row(&["country", "city"])])
            .await
            .unwrap();
        client
            .append_values("out", "Scraped", &[row(&["a", "b"])])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_maps_to_remote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::new(server.uri(), "secret");
        let err = client.get_values("s", "Input!A:Z").await.unwrap_err();

        match &err {
            SweepError::Remote { status, message } => {
                assert_eq!(*status, 429);
                assert_eq!(message, "Quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable_remote());
    }

    #[tokio::test]
    async fn test_memory_sheet_ranges() {
        let sheet = MemorySheet::new().with_rows(
            "out",
            "Scraped",
            vec![row(&["h1", "h2"]), row(&["a", "b"]), row(&["c", "d"])],
        );

        assert_eq!(sheet.get_values("out", "Scraped!1:1").await.unwrap(), vec![row(&["h1", "h2"])]);
        assert_eq!(sheet.get_values("out", "Scraped!A:Z").await.unwrap().len(), 3);
        assert!(sheet.get_values("out", "Other!A:Z").await.unwrap().is_empty());

        sheet.update_values("out", "Scraped!1:1", &[row(&["x"])]).await.unwrap();
        sheet.append_values("out", "Scraped", &[row(&["e", "f"])]).await.unwrap();
        let rows = sheet.rows("out", "Scraped");
        assert_eq!(rows[0], row(&["x"]));
        assert_eq!(rows[3], row(&["e", "f"]));
        assert_eq!(sheet.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_memory_sheet_header_on_empty_tab() {
        let sheet = MemorySheet::new();
        sheet.update_values("out", "Scraped!1:1", &[row(&["h"])]).await.unwrap();
        assert_eq!(sheet.rows("out", "Scraped"), vec![row(&["h"])]);
    }

    #[tokio::test]
    async fn test_memory_sheet_injected_failure() {
        let sheet = MemorySheet::new();
        sheet.fail_next(SweepError::Remote {
            status: 503,
            message: "down".into(),
        });
        assert!(sheet.get_values("s", "Input").await.is_err());
        assert!(sheet.get_values("s", "Input").await.is_ok());
    }
}
