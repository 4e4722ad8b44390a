use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::AppError;
use crate::storage::JobStore;

/// A local CSV file with a header row. Files are small enough that plain
/// blocking I/O is fine here.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: PathBuf) -> Self {
        CsvStore { path }
    }

    fn is_empty(&self) -> Result<bool, AppError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>, AppError> {
        Ok(csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?)
    }

    fn appender(&self) -> Result<csv::Writer<std::fs::File>, AppError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file))
    }
}

#[async_trait]
impl JobStore for CsvStore {
    fn name(&self) -> &str {
        "csv"
    }

    async fn check_ready(&self, columns: &[&str]) -> Result<(), AppError> {
        if self.is_empty()? {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut writer = self.appender()?;
            writer.write_record(columns)?;
            writer.flush()?;
            tracing::info!("Created '{}' with header row", self.path.display());
            return Ok(());
        }

        let header = self.reader()?.headers()?.clone();
        if header.len() < columns.len() {
            return Err(AppError::Upload(format!(
                "'{}' has {} columns, rows need {}",
                self.path.display(),
                header.len(),
                columns.len()
            )));
        }
        // rows are appended positionally, so the stored order must match
        if let Some((i, (found, wanted))) = header
            .iter()
            .zip(columns)
            .enumerate()
            .find(|(_, (found, wanted))| found.trim() != **wanted)
        {
            return Err(AppError::Upload(format!(
                "'{}' column {} is '{}', expected '{wanted}' (header must start with {})",
                self.path.display(),
                i + 1,
                found.trim(),
                columns.join(",")
            )));
        }
        tracing::debug!("'{}' is ready ({} columns)", self.path.display(), header.len());
        Ok(())
    }

    async fn known_urls(&self, url_column: usize) -> Result<HashSet<String>, AppError> {
        if self.is_empty()? {
            return Ok(HashSet::new());
        }
        let mut urls = HashSet::new();
        for record in self.reader()?.records() {
            if let Some(url) = record?.get(url_column).map(str::trim)
                && !url.is_empty()
            {
                urls.insert(url.to_string());
            }
        }
        Ok(urls)
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), AppError> {
        let mut writer = self.appender()?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
