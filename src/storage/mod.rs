use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::AppError;
use crate::settings::UploadSettings;

pub mod csv_store;
pub mod sheets;

/// An append-only table of string rows whose first row is a header.
#[async_trait]
pub trait JobStore: Send + Sync {
    fn name(&self) -> &str;

    /// Fail unless the destination exists and can hold rows shaped like `columns`.
    async fn check_ready(&self, columns: &[&str]) -> Result<(), AppError>;

    /// Values of the URL column below the header.
    async fn known_urls(&self, url_column: usize) -> Result<HashSet<String>, AppError>;

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), AppError>;
}

/// Build the store the settings point at: a CSV file when `upload_csv_file`
/// is set, the spreadsheet otherwise.
pub fn open_store(settings: &UploadSettings) -> Result<Box<dyn JobStore>, AppError> {
    match &settings.csv_file {
        Some(path) => Ok(Box::new(csv_store::CsvStore::new(path.clone()))),
        None => Ok(Box::new(sheets::SheetsStore::from_settings(settings)?)),
    }
}

/// Appends rows that are not already in the store.
pub struct Uploader<'a> {
    store: &'a dyn JobStore,
    url_column: usize,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn JobStore, url_column: usize) -> Self {
        Uploader { store, url_column }
    }

    pub async fn known_urls(&self) -> Result<HashSet<String>, AppError> {
        let known = self.store.known_urls(self.url_column).await?;
        tracing::info!("Got ({}) known urls from {}", known.len(), self.store.name());
        Ok(known)
    }

    /// Re-reads the known URLs right before writing, so rows added since the
    /// caller last looked are not duplicated. Returns how many rows were written.
    pub async fn upload(&self, rows: Vec<Vec<String>>) -> Result<usize, AppError> {
        let mut known = self.known_urls().await?;
        let offered = rows.len();
        let new_rows: Vec<Vec<String>> = rows
            .into_iter()
            .filter(|row| {
                row.get(self.url_column)
                    .is_some_and(|url| !url.is_empty() && known.insert(url.clone()))
            })
            .collect();

        if new_rows.is_empty() {
            tracing::info!("No new rows to upload ({offered} offered)");
            return Ok(0);
        }

        tracing::info!(
            "Uploading ({}) new rows of ({offered}) to {}...",
            new_rows.len(),
            self.store.name()
        );
        self.store.append_rows(&new_rows).await?;
        tracing::info!("Upload done");
        Ok(new_rows.len())
    }
}
