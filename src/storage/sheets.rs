use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use crate::error::AppError;
use crate::settings::UploadSettings;
use crate::storage::JobStore;

/// Characters that encodeURIComponent does NOT encode.
const ENCODE_URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// Refresh this long before the token actually expires.
const TOKEN_SLACK_SECS: i64 = 60;

/// The fields we need from a service-account key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccount {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    title: String,
    index: usize,
    grid_properties: Option<GridProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    column_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// The resolved upload target.
#[derive(Debug, Clone)]
struct Worksheet {
    spreadsheet_id: String,
    title: String,
    column_count: usize,
}

/// One worksheet of a Google spreadsheet, reached with service-account credentials.
pub struct SheetsStore {
    client: reqwest::Client,
    account: ServiceAccount,
    spreadsheet_name: String,
    worksheet_index: usize,
    token: Mutex<Option<AccessToken>>,
    worksheet: OnceCell<Worksheet>,
}

impl SheetsStore {
    /// Reads the credentials file right away so a missing or malformed key
    /// fails before any scraping starts.
    pub fn from_settings(settings: &UploadSettings) -> Result<SheetsStore, AppError> {
        let account = read_service_account(&settings.credentials_file)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("scrape-jobs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(SheetsStore {
            client,
            account,
            spreadsheet_name: settings.spreadsheet_name.clone(),
            worksheet_index: settings.worksheet_index,
            token: Mutex::new(None),
            worksheet: OnceCell::new(),
        })
    }

    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Utc::now() + Duration::seconds(TOKEN_SLACK_SECS)
        {
            return Ok(token.value.clone());
        }

        tracing::debug!("Requesting access token for {}", self.account.client_email);
        let now = Utc::now();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: SCOPES,
            aud: &self.account.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?;

        let response = self
            .client
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let token: TokenResponse = checked(response, "token exchange").await?.json().await?;

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        });
        Ok(value)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, AppError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        Ok(checked(response, what).await?.json().await?)
    }

    async fn worksheet(&self) -> Result<&Worksheet, AppError> {
        self.worksheet
            .get_or_try_init(|| async {
                let spreadsheet_id = self.find_spreadsheet().await?;
                self.find_worksheet(spreadsheet_id).await
            })
            .await
    }

    async fn find_spreadsheet(&self) -> Result<String, AppError> {
        tracing::info!("Looking up spreadsheet '{}'...", self.spreadsheet_name);
        let q = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
            self.spreadsheet_name.replace('\\', "\\\\").replace('\'', "\\'")
        );
        let list: FileList = self
            .get_json(
                DRIVE_FILES_API,
                &[
                    ("q", q.as_str()),
                    ("fields", "files(id,name)"),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ],
                "spreadsheet lookup",
            )
            .await?;
        list.files.into_iter().next().map(|f| f.id).ok_or_else(|| {
            AppError::Upload(format!(
                "spreadsheet '{}' not found (is it shared with {}?)",
                self.spreadsheet_name, self.account.client_email
            ))
        })
    }

    async fn find_worksheet(&self, spreadsheet_id: String) -> Result<Worksheet, AppError> {
        let url = format!("{SHEETS_API}/{spreadsheet_id}");
        let spreadsheet: Spreadsheet = self
            .get_json(
                &url,
                &[("fields", "sheets.properties(title,index,gridProperties.columnCount)")],
                "spreadsheet metadata",
            )
            .await?;
        let count = spreadsheet.sheets.len();
        let properties = spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.index == self.worksheet_index)
            .ok_or_else(|| {
                AppError::Upload(format!(
                    "worksheet index {} out of range ('{}' has {count} worksheets)",
                    self.worksheet_index, self.spreadsheet_name
                ))
            })?;

        let worksheet = Worksheet {
            spreadsheet_id,
            column_count: properties
                .grid_properties
                .and_then(|g| g.column_count)
                .unwrap_or(0),
            title: properties.title,
        };
        tracing::info!(
            "Using worksheet '{}' ({} columns)",
            worksheet.title,
            worksheet.column_count
        );
        Ok(worksheet)
    }
}

#[async_trait]
impl JobStore for SheetsStore {
    fn name(&self) -> &str {
        "google sheets"
    }

    async fn check_ready(&self, columns: &[&str]) -> Result<(), AppError> {
        let worksheet = self.worksheet().await?;
        if worksheet.column_count < columns.len() {
            return Err(AppError::Upload(format!(
                "worksheet '{}' has {} columns, rows need {} ({})",
                worksheet.title,
                worksheet.column_count,
                columns.len(),
                columns.join(", ")
            )));
        }
        Ok(())
    }

    async fn known_urls(&self, url_column: usize) -> Result<HashSet<String>, AppError> {
        let worksheet = self.worksheet().await?;
        let column = column_letter(url_column);
        // row 1 is the header
        let range = a1_range(&worksheet.title, &format!("{column}2:{column}"));
        let url = format!("{SHEETS_API}/{}/values/{range}", worksheet.spreadsheet_id);
        let values: ValueRange = self
            .get_json(&url, &[("majorDimension", "COLUMNS")], "reading urls")
            .await?;
        Ok(values
            .values
            .into_iter()
            .flatten()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect())
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), AppError> {
        let worksheet = self.worksheet().await?;
        let range = a1_range(&worksheet.title, "A1");
        let url = format!(
            "{SHEETS_API}/{}/values/{range}:append",
            worksheet.spreadsheet_id
        );
        let token = self.access_token().await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&serde_json::json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        checked(response, "appending rows").await?;
        Ok(())
    }
}

fn read_service_account(path: &Path) -> Result<ServiceAccount, AppError> {
    if !path.is_file() {
        return Err(AppError::Upload(format!(
            "credentials file '{}' does not exist",
            path.display()
        )));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Turn a non-2xx response into an `Upload` error carrying the start of the body.
async fn checked(response: reqwest::Response, what: &str) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Upload(format!(
        "{what} failed with HTTP {status}: {}",
        body.chars().take(300).collect::<String>()
    )))
}

/// Zero-based column index to A1 letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Sheet-qualified A1 range, quoted and encoded for use as a path segment.
fn a1_range(sheet_title: &str, cells: &str) -> String {
    let range = format!("'{}'!{cells}", sheet_title.replace('\'', "''"));
    utf8_percent_encode(&range, ENCODE_URI_COMPONENT_SET).to_string()
}
