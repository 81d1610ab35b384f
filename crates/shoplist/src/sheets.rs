//! Google Sheets ledger backend (Sheets API v4, values collection).
//!
//! Every call addresses one tab of one spreadsheet. Values are written with
//! `valueInputOption=RAW` so cells hold exactly the text the codec produced.

use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Method, Url,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shoplist_core::{CellAddress, Error, LedgerBackend, Result};
use tracing::{info, instrument};

use crate::google_auth::TokenSource;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const LAST_COLUMN: &str = "G";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// `'<tab>'!<cells>` with the tab name quoted
fn quoted_range(sheet_name: &str, cells: &str) -> String {
    format!("'{}'!{cells}", sheet_name.replace('\'', "''"))
}

/// Spreadsheet URL plus path segments; `suffix` is glued onto the last
/// segment (the API's `:append` style custom methods)
fn api_url(spreadsheet_id: &str, segments: &[&str], suffix: &str) -> Result<Url> {
    let mut url =
        Url::parse(API_BASE).map_err(|e| Error::backend(format!("invalid api base: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| Error::backend("api base cannot take path segments"))?;
        let mut all = std::iter::once(spreadsheet_id)
            .chain(segments.iter().copied())
            .peekable();
        while let Some(segment) = all.next() {
            if all.peek().is_none() {
                path.push(&format!("{segment}{suffix}"));
            } else {
                path.push(segment);
            }
        }
    }
    Ok(url)
}

/// Ledger stored in one tab of a Google spreadsheet
pub struct SheetsBackend {
    client: reqwest::Client,
    tokens: TokenSource,
    spreadsheet_id: String,
    sheet_name: String,
}

impl SheetsBackend {
    pub fn new(
        tokens: TokenSource,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::backend(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            tokens,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
        })
    }

    /// Create the tab if the spreadsheet does not have it yet
    #[instrument(skip(self), fields(tab = %self.sheet_name))]
    pub async fn ensure_tab(&self) -> Result<()> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let meta: SpreadsheetMeta = serde_json::from_value(self.request(Method::GET, url, None).await?)
            .map_err(|e| Error::backend(format!("unreadable spreadsheet metadata: {e}")))?;

        if meta.sheets.iter().any(|s| s.properties.title == self.sheet_name) {
            return Ok(());
        }

        let url = self.url_with_suffix(&[], ":batchUpdate")?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": self.sheet_name } } }]
        });
        self.request(Method::POST, url, Some(body)).await?;
        info!("created missing ledger tab");
        Ok(())
    }

    fn range(&self, cells: &str) -> String {
        quoted_range(&self.sheet_name, cells)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        api_url(&self.spreadsheet_id, segments, "")
    }

    fn url_with_suffix(&self, segments: &[&str], suffix: &str) -> Result<Url> {
        api_url(&self.spreadsheet_id, segments, suffix)
    }

    async fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::backend(format!("invalid auth header: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    #[instrument(name = "sheets_request", skip(self, body), fields(path = %url.path()))]
    async fn request(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
        let mut request = self
            .client
            .request(method, url)
            .headers(self.auth_headers().await?);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::backend(format!("sheets request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::backend(format!("sheets returned {status}: {detail}")));
        }
        response
            .json()
            .await
            .map_err(|e| Error::backend(format!("sheets response unreadable: {e}")))
    }

    async fn get_range(&self, cells: &str) -> Result<Vec<Vec<String>>> {
        let url = self.url(&["values", self.range(cells).as_str()])?;
        let range: ValueRange = serde_json::from_value(self.request(Method::GET, url, None).await?)
            .map_err(|e| Error::backend(format!("unreadable value range: {e}")))?;
        Ok(range.values)
    }
}

#[async_trait::async_trait]
impl LedgerBackend for SheetsBackend {
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>> {
        self.get_range(&format!("A:{LAST_COLUMN}")).await
    }

    async fn append_row(&self, row: Vec<String>) -> Result<()> {
        let mut url = self.url_with_suffix(&["values", self.range(&format!("A:{LAST_COLUMN}")).as_str()], ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.request(Method::POST, url, Some(json!({ "values": [row] })))
            .await
            .map(drop)
    }

    async fn batch_update_cells(&self, cells: &[(CellAddress, String)]) -> Result<()> {
        if cells.is_empty() {
            return Ok(());
        }
        let data: Vec<Value> = cells
            .iter()
            .map(|(address, value)| {
                json!({ "range": self.range(&address.to_string()), "values": [[value]] })
            })
            .collect();
        let url = self.url_with_suffix(&["values"], ":batchUpdate")?;
        self.request(
            Method::POST,
            url,
            Some(json!({ "valueInputOption": "RAW", "data": data })),
        )
        .await
        .map(drop)
    }

    async fn read_cell(&self, address: CellAddress) -> Result<String> {
        let rows = self.get_range(&address.to_string()).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default())
    }

    async fn clear_table(&self) -> Result<()> {
        let url = self.url_with_suffix(&["values", self.range(&format!("A:{LAST_COLUMN}")).as_str()], ":clear")?;
        self.request(Method::POST, url, Some(json!({}))).await.map(drop)
    }
}
