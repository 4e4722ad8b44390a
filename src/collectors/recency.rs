use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::AppError;
use crate::models::job::JobRecord;

/// Accepts records posted on or after the calendar day `days` ago (UTC).
///
/// The cutoff is fixed when the predicate is built, and the comparison is by
/// date, not instant: anything posted earlier on the cutoff day still passes.
#[derive(Debug, Clone, Copy)]
pub struct MaxPostAge {
    days: i64,
    cutoff: NaiveDate,
}

impl MaxPostAge {
    pub fn new(days: i64) -> Result<MaxPostAge, AppError> {
        Self::at(days, Utc::now())
    }

    /// Build with an explicit "now".
    pub fn at(days: i64, now: DateTime<Utc>) -> Result<MaxPostAge, AppError> {
        if days <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "max post age must be a positive number of days, got {days}"
            )));
        }
        let cutoff = (now - Duration::days(days)).date_naive();
        tracing::debug!("Max post age {days} day(s), accepting posts from {cutoff}");
        Ok(MaxPostAge { days, cutoff })
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub fn accepts(&self, posted_time: Option<DateTime<Utc>>) -> bool {
        posted_time.is_some_and(|t| t.date_naive() >= self.cutoff)
    }

    pub fn is_recent<R: JobRecord>(&self, record: &R) -> bool {
        self.accepts(record.posted_time())
    }
}

impl FromStr for MaxPostAge {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let days: i64 = s.trim().parse().map_err(|_| {
            AppError::InvalidArgument(format!("max post age must be an integer, got '{s}'"))
        })?;
        MaxPostAge::new(days)
    }
}
