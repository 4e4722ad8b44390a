use chrono::{DateTime, Utc};

use crate::models::job::{FieldValue, JobRecord, POSTED_TIME, SCRAPED_TIME, URL};

/// A job card from a seek.com.au search results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekJob {
    pub url: String,
    /// Derived from the relative listing age ("3d ago") at extraction time.
    pub posted_time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub area: Option<String>,
    pub classification: Option<String>,
    pub sub_classification: Option<String>,
    pub salary: Option<String>,
    /// Paid "featured" placement; these float above the date ordering.
    pub featured: bool,
}

const COLUMNS: &[&str] = &[
    SCRAPED_TIME,
    POSTED_TIME,
    "title",
    "company",
    "location",
    "area",
    "classification",
    "sub_classification",
    "salary",
    "featured",
    URL,
];

impl JobRecord for SeekJob {
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
            "area" => text(&self.area),
            "classification" => text(&self.classification),
            "sub_classification" => text(&self.sub_classification),
            "salary" => text(&self.salary),
            "featured" => Some(FieldValue::Flag(self.featured)),
            URL => Some(FieldValue::Text(self.url.clone())),
            _ => None,
        }
    }
}
