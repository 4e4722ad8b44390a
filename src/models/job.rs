use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;

use crate::settings::TimeSettings;

pub const SCRAPED_TIME: &str = "scraped_time";
pub const POSTED_TIME: &str = "posted_time";
pub const URL: &str = "url";

/// One value of a parsed record, before it is rendered into a row cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Time(DateTime<Utc>),
    Flag(bool),
}

/// The minimal interface the collection loop and uploader need from a
/// site-specific record. Everything else is reached through `field`.
pub trait JobRecord: Send + Sync {
    /// Column names, in row order. Always starts with `scraped_time` and
    /// contains `url`.
    fn columns() -> &'static [&'static str];

    /// Identity key used for deduplication.
    fn url(&self) -> &str;

    fn posted_time(&self) -> Option<DateTime<Utc>>;

    /// Value of a column other than `scraped_time`; `None` when the field was absent.
    fn field(&self, column: &str) -> Option<FieldValue>;
}

/// Index of the `url` column for a record type.
pub fn url_column<R: JobRecord>() -> usize {
    R::columns()
        .iter()
        .position(|c| *c == URL)
        .unwrap_or(R::columns().len().saturating_sub(1))
}

/// Renders records into string-only rows for the store.
#[derive(Debug, Clone)]
pub struct RowFormatter {
    timezone: Option<Tz>,
    posted_format: String,
    scraped_stamp: String,
}

impl RowFormatter {
    pub fn new(time: &TimeSettings, scraped_at: DateTime<Utc>) -> Self {
        let mut formatter = RowFormatter {
            timezone: time.timezone,
            posted_format: time.posted_format.clone(),
            scraped_stamp: String::new(),
        };
        formatter.scraped_stamp = formatter.format_time(scraped_at, &time.scraped_format);
        formatter
    }

    pub fn scraped_stamp(&self) -> &str {
        &self.scraped_stamp
    }

    fn format_time(&self, time: DateTime<Utc>, format: &str) -> String {
        match self.timezone {
            Some(tz) => time.with_timezone(&tz).format(format).to_string(),
            None => time.with_timezone(&Local).format(format).to_string(),
        }
    }

    pub fn row<R: JobRecord>(&self, record: &R) -> Vec<String> {
        R::columns()
            .iter()
            .map(|column| {
                if *column == SCRAPED_TIME {
                    return self.scraped_stamp.clone();
                }
                match record.field(column) {
                    Some(FieldValue::Text(text)) => text,
                    Some(FieldValue::Time(time)) => self.format_time(time, &self.posted_format),
                    Some(FieldValue::Flag(flag)) => flag.to_string(),
                    None => String::new(),
                }
            })
            .collect()
    }

    pub fn rows<R: JobRecord>(&self, records: &[R]) -> Vec<Vec<String>> {
        tracing::info!("Converting ({}) records to rows...", records.len());
        records.iter().map(|r| self.row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::linkedin_job::LinkedinJob;

    fn sydney() -> TimeSettings {
        TimeSettings {
            timezone: Some(chrono_tz::Australia::Sydney),
            scraped_format: "%Y-%m-%d %H:%M".to_string(),
            posted_format: "%d/%m/%Y".to_string(),
        }
    }

    #[test]
    fn row_follows_column_order_with_zone_conversion() {
        let scraped_at = Utc.with_ymd_and_hms(2024, 1, 31, 22, 15, 0).unwrap();
        let formatter = RowFormatter::new(&sydney(), scraped_at);
        // 22:15 UTC on Jan 31 is 09:15 on Feb 1 in Sydney (AEDT, +11)
        assert_eq!(formatter.scraped_stamp(), "2024-02-01 09:15");

        let job = LinkedinJob {
            url: "https://www.linkedin.com/jobs/view/1".to_string(),
            posted_time: Some(Utc.with_ymd_and_hms(2024, 1, 30, 14, 0, 0).unwrap()),
            title: Some("Rust Engineer".to_string()),
            company: None,
            location: Some("Sydney".to_string()),
        };
        assert_eq!(
            formatter.row(&job),
            vec![
                "2024-02-01 09:15",
                "31/01/2024",
                "Rust Engineer",
                "",
                "Sydney",
                "https://www.linkedin.com/jobs/view/1",
            ]
        );
    }

    #[test]
    fn absent_posted_time_renders_empty() {
        let formatter = RowFormatter::new(&sydney(), Utc::now());
        let job = LinkedinJob {
            url: "u".to_string(),
            posted_time: None,
            title: None,
            company: None,
            location: None,
        };
        let row = formatter.row(&job);
        assert_eq!(row[1], "");
        assert_eq!(row.len(), LinkedinJob::columns().len());
    }

    #[test]
    fn url_column_is_found_by_name() {
        assert_eq!(url_column::<LinkedinJob>(), 5);
    }
}
