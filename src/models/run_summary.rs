use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// End-of-run counters for one scrape.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub site: String,
    pub status: RunStatus,
    pub pages: usize,
    /// Records that passed the recency filter.
    pub jobs_found: usize,
    /// Of those, records whose URL was not in the store yet.
    pub jobs_new: usize,
    pub jobs_uploaded: usize,
    pub stop_reason: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn start(site: &str) -> RunSummary {
        RunSummary {
            site: site.to_string(),
            status: RunStatus::Succeeded,
            pages: 0,
            jobs_found: 0,
            jobs_new: 0,
            jobs_uploaded: 0,
            stop_reason: String::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record an error; the run counts as failed from here on.
    pub fn mark_failed(&mut self, error: &str) {
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
    }

    /// Stamp the finish time and log the summary.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        match self.status {
            RunStatus::Succeeded => tracing::info!("{self}"),
            RunStatus::Failed => tracing::error!("{self}"),
        }
        if let Ok(json) = serde_json::to_string(self) {
            tracing::debug!("Run summary: {json}");
        }
    }

    pub fn elapsed_secs(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run for '{}' {}: {} page(s), {} found, {} new, {} uploaded, stopped on {} after {}s",
            self.site,
            match self.status {
                RunStatus::Succeeded => "succeeded",
                RunStatus::Failed => "failed",
            },
            self.pages,
            self.jobs_found,
            self.jobs_new,
            self.jobs_uploaded,
            if self.stop_reason.is_empty() { "-" } else { &self.stop_reason },
            self.elapsed_secs()
        )?;
        if let Some(error) = &self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}
