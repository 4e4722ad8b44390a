use std::collections::HashSet;
use std::fmt;

use crate::collectors::ResultsControl;
use crate::error::AppError;
use crate::models::job::JobRecord;

/// Why the collection loop stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The results list was empty (or emptied) before any further page.
    NoResults,
    /// `max_stale_pages` consecutive pages contributed nothing new and recent.
    Exhausted,
    /// There was no next page to advance to.
    LastPage,
    /// Talking to the page failed; records collected up to that point are kept.
    Failed(AppError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::NoResults => f.write_str("no results"),
            StopReason::Exhausted => f.write_str("exhausted"),
            StopReason::LastPage => f.write_str("no more pages"),
            StopReason::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Outcome of one collection run: the matching records, sorted by
/// `posted_time`, plus how the walk ended.
#[derive(Debug)]
pub struct Collected<R> {
    pub records: Vec<R>,
    pub pages: usize,
    pub stop: StopReason,
}

impl<R> Collected<R> {
    /// A walk that never reached the results, e.g. because the search failed.
    pub fn aborted(error: AppError) -> Self {
        Collected {
            records: Vec::new(),
            pages: 0,
            stop: StopReason::Failed(error),
        }
    }
}

/// Walk the result pages, keeping records not seen earlier in this run that
/// pass `is_recent`.
///
/// A page that adds no such record is stale; the walk ends after
/// `max_stale_pages` stale pages in a row (values below 1 are treated as 1),
/// so a single out-of-order or ad-filled page does not cut the walk short.
/// Identity is the record URL only. Driver errors end the walk early
/// without discarding what was already collected.
pub async fn collect<P, F>(page: &P, is_recent: F, max_stale_pages: u32) -> Collected<P::Record>
where
    P: ResultsControl + ?Sized,
    F: Fn(&P::Record) -> bool,
{
    let max_stale_pages = max_stale_pages.max(1);
    let mut seen: HashSet<String> = HashSet::new();
    let mut records: Vec<P::Record> = Vec::new();
    let mut stale_streak = 0u32;
    let mut pages = 0usize;

    let stop = loop {
        match page.has_results().await {
            Ok(true) => {}
            Ok(false) => break StopReason::NoResults,
            Err(e) => break StopReason::Failed(e),
        }

        let visible = match page.visible_records().await {
            Ok(visible) => visible,
            Err(e) => break StopReason::Failed(e),
        };
        pages += 1;

        let unseen: Vec<P::Record> = visible
            .into_iter()
            .filter(|r| seen.insert(r.url().to_string()))
            .collect();
        let unseen_count = unseen.len();

        let matching: Vec<P::Record> = unseen.into_iter().filter(|r| is_recent(r)).collect();
        tracing::info!(
            "Page {pages}: {unseen_count} previously unseen, {} matching",
            matching.len()
        );
        for record in &matching {
            tracing::debug!("Collected {}", record.url());
        }

        if matching.is_empty() {
            stale_streak += 1;
            if stale_streak >= max_stale_pages {
                tracing::warn!("{stale_streak} stale page(s) in a row, done iterating");
                break StopReason::Exhausted;
            }
            tracing::warn!("No new matching results, will stop after {max_stale_pages} in a row");
        } else {
            records.extend(matching);
            stale_streak = 0;
        }

        match page.has_next_page().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("No next results page present");
                break StopReason::LastPage;
            }
            Err(e) => break StopReason::Failed(e),
        }

        tracing::info!("Proceeding to next results page...");
        if let Err(e) = page.advance_page().await {
            break StopReason::Failed(e);
        }
    };

    if let StopReason::Failed(e) = &stop {
        tracing::error!(
            "Collection stopped by error after {pages} page(s), keeping {} records: {e}",
            records.len()
        );
    }

    // stable: equal timestamps keep discovery order
    records.sort_by_key(|r| r.posted_time());
    tracing::info!("Total of {} records collected ({stop})", records.len());

    Collected {
        records,
        pages,
        stop,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::collectors::recency::MaxPostAge;
    use crate::models::linkedin_job::LinkedinJob;

    pub(crate) fn job(url: &str, posted_time: Option<DateTime<Utc>>) -> LinkedinJob {
        LinkedinJob {
            url: url.to_string(),
            posted_time,
            title: None,
            company: None,
            location: None,
        }
    }

    enum Step {
        Page(Vec<LinkedinJob>),
        Fail,
    }

    /// Serves scripted pages; `has_next_page` is true while scripted pages remain,
    /// unless `last_page_has_next` keeps it true on the final one.
    struct ScriptedPages {
        steps: Vec<Step>,
        current: Mutex<usize>,
        last_page_has_next: bool,
        pages_served: Mutex<Vec<usize>>,
    }

    impl ScriptedPages {
        fn new(steps: Vec<Step>) -> Self {
            ScriptedPages {
                steps,
                current: Mutex::new(0),
                last_page_has_next: false,
                pages_served: Mutex::new(Vec::new()),
            }
        }

        fn served(&self) -> Vec<usize> {
            self.pages_served.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResultsControl for ScriptedPages {
        type Record = LinkedinJob;

        async fn has_results(&self) -> Result<bool, AppError> {
            Ok(!self.steps.is_empty())
        }

        async fn has_next_page(&self) -> Result<bool, AppError> {
            let current = *self.current.lock().unwrap();
            Ok(current + 1 < self.steps.len() || self.last_page_has_next)
        }

        async fn visible_records(&self) -> Result<Vec<LinkedinJob>, AppError> {
            let current = *self.current.lock().unwrap();
            self.pages_served.lock().unwrap().push(current);
            match &self.steps[current] {
                Step::Page(records) => Ok(records.clone()),
                Step::Fail => Err(AppError::Navigation("page did not render".to_string())),
            }
        }

        async fn advance_page(&self) -> Result<(), AppError> {
            let mut current = self.current.lock().unwrap();
            if *current + 1 < self.steps.len() {
                *current += 1;
            }
            Ok(())
        }
    }

    fn recent() -> Option<DateTime<Utc>> {
        Some(Utc::now() - Duration::hours(1))
    }

    fn old() -> Option<DateTime<Utc>> {
        Some(Utc::now() - Duration::days(30))
    }

    fn urls(records: &[LinkedinJob]) -> Vec<&str> {
        records.iter().map(|r| r.url.as_str()).collect()
    }

    #[tokio::test]
    async fn stops_after_second_consecutive_stale_page() {
        let pages = ScriptedPages::new(vec![
            Step::Page(vec![job("A", recent())]),
            Step::Page(vec![]),
            Step::Page(vec![]),
            Step::Page(vec![job("B", recent())]),
        ]);
        let max_age = MaxPostAge::new(3).unwrap();

        let collected = collect(&pages, |r| max_age.is_recent(r), 2).await;

        assert_eq!(urls(&collected.records), vec!["A"]);
        assert!(matches!(collected.stop, StopReason::Exhausted));
        assert_eq!(pages.served(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn single_stale_page_is_tolerated() {
        let pages = ScriptedPages::new(vec![
            Step::Page(vec![job("A", recent())]),
            Step::Page(vec![job("old", old())]),
            Step::Page(vec![job("B", recent())]),
        ]);
        let max_age = MaxPostAge::new(3).unwrap();

        let collected = collect(&pages, |r| max_age.is_recent(r), 2).await;

        assert_eq!(urls(&collected.records).len(), 2);
        assert!(matches!(collected.stop, StopReason::LastPage));
        assert_eq!(collected.pages, 3);
    }

    #[tokio::test]
    async fn one_strike_stops_on_first_stale_page() {
        let pages = ScriptedPages::new(vec![
            Step::Page(vec![job("A", recent())]),
            Step::Page(vec![]),
            Step::Page(vec![job("B", recent())]),
        ]);

        let collected = collect(&pages, |_| true, 1).await;

        assert_eq!(urls(&collected.records), vec!["A"]);
        assert!(matches!(collected.stop, StopReason::Exhausted));
    }

    #[tokio::test]
    async fn zero_stale_limit_behaves_like_one() {
        let pages = ScriptedPages::new(vec![Step::Page(vec![]), Step::Page(vec![job("A", recent())])]);

        let collected = collect(&pages, |_| true, 0).await;

        assert!(collected.records.is_empty());
        assert_eq!(pages.served(), vec![0]);
    }

    #[tokio::test]
    async fn same_fixed_page_yields_one_batch_per_run() {
        let fixed = vec![job("u1", recent()), job("u2", recent()), job("u1", recent())];
        let max_age = MaxPostAge::new(3).unwrap();

        for _ in 0..2 {
            let pages = ScriptedPages::new(vec![Step::Page(fixed.clone())]);
            let collected = collect(&pages, |r| max_age.is_recent(r), 2).await;
            assert_eq!(urls(&collected.records).len(), 2);
            assert!(matches!(collected.stop, StopReason::LastPage));
        }
    }

    #[tokio::test]
    async fn repeated_page_counts_as_stale() {
        // a page that keeps re-rendering the same cards never adds anything new
        let fixed = vec![job("u1", recent())];
        let mut pages = ScriptedPages::new(vec![Step::Page(fixed)]);
        pages.last_page_has_next = true;

        let collected = collect(&pages, |_| true, 2).await;

        assert_eq!(urls(&collected.records), vec!["u1"]);
        assert!(matches!(collected.stop, StopReason::Exhausted));
        assert_eq!(pages.served(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn dedup_ignores_fields_other_than_url() {
        // same post polled twice with different titles is still one record
        let mut second = job("A", recent());
        second.title = Some("edited".to_string());
        let pages = ScriptedPages::new(vec![
            Step::Page(vec![job("A", recent())]),
            Step::Page(vec![second, job("B", recent())]),
        ]);

        let collected = collect(&pages, |_| true, 2).await;

        assert_eq!(urls(&collected.records).len(), 2);
        assert_eq!(collected.records[0].title, None);
    }

    #[tokio::test]
    async fn results_are_sorted_ascending_by_posted_time() {
        let day = |d: u32| Some(Utc.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap());
        let pages = ScriptedPages::new(vec![
            Step::Page(vec![job("day1", day(1))]),
            Step::Page(vec![job("day3", day(3))]),
            Step::Page(vec![job("day2", day(2)), job("day2-later-found", day(2))]),
        ]);

        let collected = collect(&pages, |_| true, 2).await;

        assert_eq!(
            urls(&collected.records),
            vec!["day1", "day2", "day2-later-found", "day3"]
        );
    }

    #[tokio::test]
    async fn failure_keeps_partial_results() {
        let pages = ScriptedPages::new(vec![
            Step::Page(vec![job("p1", recent())]),
            Step::Page(vec![job("p2", recent())]),
            Step::Fail,
            Step::Page(vec![job("p4", recent())]),
            Step::Page(vec![job("p5", recent())]),
        ]);

        let collected = collect(&pages, |_| true, 2).await;

        assert_eq!(urls(&collected.records).len(), 2);
        assert!(collected.stop.is_failure());
        assert!(collected.stop.to_string().contains("page did not render"));
    }

    #[tokio::test]
    async fn empty_results_stop_immediately() {
        let pages = ScriptedPages::new(vec![]);

        let collected = collect(&pages, |_| true, 2).await;

        assert!(collected.records.is_empty());
        assert_eq!(collected.pages, 0);
        assert!(matches!(collected.stop, StopReason::NoResults));
    }

    #[tokio::test]
    async fn records_without_posted_time_never_match() {
        let pages = ScriptedPages::new(vec![Step::Page(vec![job("x", None)])]);
        let max_age = MaxPostAge::new(30).unwrap();

        let collected = collect(&pages, |r| max_age.is_recent(r), 2).await;

        assert!(collected.records.is_empty());
    }
}
