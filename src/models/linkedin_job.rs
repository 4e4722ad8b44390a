use chrono::{DateTime, Utc};

use crate::models::job::{FieldValue, JobRecord, POSTED_TIME, SCRAPED_TIME, URL};

/// A job card from the LinkedIn public jobs search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedinJob {
    pub url: String,
    pub posted_time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
}

const COLUMNS: &[&str] = &[
    SCRAPED_TIME,
    POSTED_TIME,
    "title",
    "company",
    "location",
    URL,
];

impl JobRecord for LinkedinJob {
    fn columns() -> &'static [&'static str] {
        COLUMNS
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn posted_time(&self) -> Option<DateTime<Utc>> {
        self.posted_time
    }

    fn field(&self, column: &str) -> Option<FieldValue> {
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        match column {
            POSTED_TIME => self.posted_time.map(FieldValue::Time),
            "title" => text(&self.title),
            "company" => text(&self.company),
            "location" => text(&self.location),
            URL => Some(FieldValue::Text(self.url.clone())),
            _ => None,
        }
    }
}
