use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html};

use crate::browser::PageDriver;
use crate::collectors::html::{attr_of, canonical_url, selector, text_of};
use crate::collectors::{ResultsControl, SearchControl};
use crate::error::AppError;
use crate::models::linkedin_job::LinkedinJob;

const HOME_URL: &str = "https://www.linkedin.com/";
const JOBS_URL: &str = "https://www.linkedin.com/jobs";

/// Labels offered by the "Date posted" filter.
pub const DATE_POSTED_CHOICES: &[&str] = &["Past 24 hours", "Past week", "Past month", "Any time"];

const COOKIES_BANNER: &str = "button[action-type='DENY'], label[for=cookie-policy] > figure";
const KEYWORDS_INPUT: &str = "input[name='keywords']";
const LOCATION_INPUT: &str = "input[name='location']";
const SEARCH_BUTTON: &str =
    "button[data-tracking-control-name*='search-submit'], form button[type='submit']";
const RESULTS_LIST: &str = "ul.jobs-search__results-list, section.results__container > ul";
const RESULT_ITEM: &str = "ul.jobs-search__results-list > li, li.result-card";
const DATE_POSTED_BUTTON: &str = "*:has(> div#TIME_POSTED-dropdown) > button";
const DATE_POSTED_OPTION: &str = "div#TIME_POSTED-dropdown li label";
const DATE_POSTED_APPLY: &str = "div#TIME_POSTED-dropdown button[class*='apply']";
const SEE_MORE: &str = "button.see-more-jobs, button.infinite-scroller__show-more-button";
const VIEWED_ALL: &str = "div.see-more-jobs__viewed-all";

const CARD: &str = "li.result-card, ul.jobs-search__results-list > li";
const TITLE: &str = "h3.job-result-card__title, .base-search-card__title";
const COMPANY: &str = "h4.result-card__subtitle, .base-search-card__subtitle";
const LOCATION: &str = "span.job-result-card__location, .job-search-card__location";
const CARD_LINK: &str = "a.result-card__full-card-link, a.base-card__full-link";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const FILTER_TIMEOUT: Duration = Duration::from_secs(10);
const SEE_MORE_TIMEOUT: Duration = Duration::from_secs(2);

/// The public LinkedIn jobs search. Results form one infinite list, so every
/// "page" re-lists the cards already seen.
pub struct LinkedinPage<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    keywords: String,
    location: String,
    date_posted: String,
}

impl<'a, D: PageDriver + ?Sized> LinkedinPage<'a, D> {
    pub fn new(
        driver: &'a D,
        keywords: &str,
        location: &str,
        date_posted: &str,
    ) -> Result<Self, AppError> {
        if !DATE_POSTED_CHOICES
            .iter()
            .any(|choice| choice.eq_ignore_ascii_case(date_posted.trim()))
        {
            return Err(AppError::InvalidArgument(format!(
                "unsupported date_posted '{date_posted}', expected one of {DATE_POSTED_CHOICES:?}"
            )));
        }
        Ok(LinkedinPage {
            driver,
            keywords: keywords.to_string(),
            location: location.to_string(),
            date_posted: date_posted.trim().to_string(),
        })
    }

    async fn apply_date_posted(&self) -> Result<(), AppError> {
        tracing::info!("Setting 'Date posted' filter to '{}'", self.date_posted);
        self.driver
            .require_visible(DATE_POSTED_BUTTON, FILTER_TIMEOUT)
            .await?;
        self.driver.click(DATE_POSTED_BUTTON).await?;
        self.driver
            .require_visible(DATE_POSTED_OPTION, FILTER_TIMEOUT)
            .await?;
        self.driver
            .click_text(DATE_POSTED_OPTION, &self.date_posted)
            .await?;
        self.driver.click(DATE_POSTED_APPLY).await
    }
}

#[async_trait]
impl<D: PageDriver + ?Sized> SearchControl for LinkedinPage<'_, D> {
    fn name(&self) -> &str {
        "linkedin.com"
    }

    async fn open(&self) -> Result<(), AppError> {
        tracing::info!("Opening {JOBS_URL}");
        self.driver.goto(JOBS_URL).await?;
        if self.driver.is_visible(COOKIES_BANNER).await? {
            tracing::debug!("Dismissing cookies banner");
            self.driver.click(COOKIES_BANNER).await?;
        }
        self.driver
            .require_visible(KEYWORDS_INPUT, SEARCH_TIMEOUT)
            .await
    }

    async fn set_params(&self) -> Result<(), AppError> {
        tracing::info!("Setting search keywords to '{}'", self.keywords);
        self.driver.type_text(KEYWORDS_INPUT, &self.keywords).await?;
        tracing::info!("Setting search location to '{}'", self.location);
        self.driver.type_text(LOCATION_INPUT, &self.location).await
    }

    async fn trigger_search(&self) -> Result<(), AppError> {
        tracing::info!("Triggering search...");
        self.driver.click(SEARCH_BUTTON).await
    }

    /// The date filter only exists on the results page, so it is applied
    /// once the first results render, followed by a second wait.
    async fn wait_for_search_complete(&self) -> Result<(), AppError> {
        tracing::info!("Waiting for search to complete...");
        self.driver
            .require_visible(RESULTS_LIST, SEARCH_TIMEOUT)
            .await?;
        self.apply_date_posted().await?;
        self.driver
            .require_visible(RESULTS_LIST, SEARCH_TIMEOUT)
            .await
    }
}

#[async_trait]
impl<D: PageDriver + ?Sized> ResultsControl for LinkedinPage<'_, D> {
    type Record = LinkedinJob;

    async fn has_results(&self) -> Result<bool, AppError> {
        self.driver.is_visible(RESULT_ITEM).await
    }

    async fn has_next_page(&self) -> Result<bool, AppError> {
        self.driver.scroll_to_bottom().await?;
        if self.driver.is_visible(VIEWED_ALL).await? {
            tracing::info!("LinkedIn reports all jobs viewed");
            return Ok(false);
        }
        self.driver.wait_visible(SEE_MORE, SEE_MORE_TIMEOUT).await
    }

    async fn visible_records(&self) -> Result<Vec<LinkedinJob>, AppError> {
        let html = self.driver.content().await?;
        let jobs = parse_jobs(&html);
        tracing::info!("Got ({}) visible results", jobs.len());
        Ok(jobs)
    }

    async fn advance_page(&self) -> Result<(), AppError> {
        tracing::info!("Clicking 'See more jobs'...");
        self.driver.click(SEE_MORE).await?;
        self.driver.require_visible(RESULT_ITEM, SEARCH_TIMEOUT).await
    }
}

/// Extract every job card from the rendered results list. Both the older
/// `result-card` markup and the current `base-search-card` markup are read.
pub fn parse_jobs(html: &str) -> Vec<LinkedinJob> {
    let document = Html::parse_document(html);
    let Some(card_selector) = selector(CARD) else {
        return Vec::new();
    };
    document.select(&card_selector).filter_map(parse_card).collect()
}

fn parse_card(card: ElementRef<'_>) -> Option<LinkedinJob> {
    let Some(url) = attr_of(card, CARD_LINK, "href").and_then(|href| canonical_url(HOME_URL, &href))
    else {
        tracing::debug!("Skipping linkedin card without a job link");
        return None;
    };
    Some(LinkedinJob {
        url,
        posted_time: attr_of(card, "time[datetime]", "datetime").and_then(|d| posted_date(&d)),
        title: text_of(card, TITLE),
        company: text_of(card, COMPANY),
        location: text_of(card, LOCATION),
    })
}

/// `YYYY-MM-DD` as midnight UTC.
fn posted_date(value: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::browser::fake::FakeDriver;

    const CURRENT_MARKUP: &str = r#"
        <html><body><main>
        <ul class="jobs-search__results-list">
          <li>
            <div class="base-card">
              <a class="base-card__full-link" href="https://au.linkedin.com/jobs/view/rust-engineer-3812?refId=abc&amp;trackingId=xyz"></a>
              <h3 class="base-search-card__title">
                Rust Engineer
              </h3>
              <h4 class="base-search-card__subtitle"><a>Ferrous Systems</a></h4>
              <span class="job-search-card__location">Sydney, New South Wales, Australia</span>
              <time class="job-search-card__listdate" datetime="2024-03-12">3 days ago</time>
            </div>
          </li>
          <li>
            <div class="base-card">
              <h3 class="base-search-card__title">Promoted, no link</h3>
            </div>
          </li>
        </ul>
        </main></body></html>"#;

    const LEGACY_MARKUP: &str = r#"
        <ul class="results__list">
          <li class="result-card job-result-card">
            <a class="result-card__full-card-link" href="https://www.linkedin.com/jobs/view/99?trk=guest"></a>
            <h3 class="job-result-card__title">Platform Engineer</h3>
            <h4 class="result-card__subtitle">Acme</h4>
            <span class="job-result-card__location">Melbourne</span>
            <time datetime="not-a-date">recently</time>
          </li>
        </ul>"#;

    #[test]
    fn current_markup_is_parsed() {
        let jobs = parse_jobs(CURRENT_MARKUP);
        assert_eq!(
            jobs,
            vec![LinkedinJob {
                url: "https://au.linkedin.com/jobs/view/rust-engineer-3812".to_string(),
                posted_time: Some(Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap()),
                title: Some("Rust Engineer".to_string()),
                company: Some("Ferrous Systems".to_string()),
                location: Some("Sydney, New South Wales, Australia".to_string()),
            }]
        );
    }

    #[test]
    fn legacy_markup_is_parsed_and_bad_dates_are_absent() {
        let jobs = parse_jobs(LEGACY_MARKUP);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://www.linkedin.com/jobs/view/99");
        assert_eq!(jobs[0].title.as_deref(), Some("Platform Engineer"));
        assert_eq!(jobs[0].posted_time, None);
    }

    #[test]
    fn unknown_date_posted_is_rejected() {
        let driver = FakeDriver::default();
        assert!(LinkedinPage::new(&driver, "rust", "Sydney", "PAST MONTH").is_ok());
        assert!(matches!(
            LinkedinPage::new(&driver, "rust", "Sydney", "Past decade"),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn date_filter_is_applied_after_first_results() {
        let driver = FakeDriver::default();
        for selector in [KEYWORDS_INPUT, RESULTS_LIST, DATE_POSTED_BUTTON, DATE_POSTED_OPTION] {
            driver.show(selector);
        }
        let page = LinkedinPage::new(&driver, "rust", "Sydney", "Past Month").unwrap();

        page.open().await.unwrap();
        page.set_params().await.unwrap();
        page.trigger_search().await.unwrap();
        page.wait_for_search_complete().await.unwrap();

        assert_eq!(
            driver.actions(),
            vec![
                format!("goto {JOBS_URL}"),
                format!("type {KEYWORDS_INPUT} rust"),
                format!("type {LOCATION_INPUT} Sydney"),
                format!("click {SEARCH_BUTTON}"),
                format!("click {DATE_POSTED_BUTTON}"),
                format!("click_text {DATE_POSTED_OPTION} Past Month"),
                format!("click {DATE_POSTED_APPLY}"),
            ]
        );
    }

    #[tokio::test]
    async fn viewed_all_banner_ends_the_list() {
        let driver = FakeDriver::with_html(CURRENT_MARKUP);
        driver.show(SEE_MORE);
        let page = LinkedinPage::new(&driver, "rust", "Sydney", "Past week").unwrap();
        assert!(page.has_next_page().await.unwrap());

        driver.show(VIEWED_ALL);
        assert!(!page.has_next_page().await.unwrap());
        assert_eq!(driver.actions(), vec!["scroll", "scroll"]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_see_more_button_ends_the_list() {
        let driver = FakeDriver::with_html(CURRENT_MARKUP);
        let page = LinkedinPage::new(&driver, "rust", "Sydney", "Past week").unwrap();
        assert!(!page.has_next_page().await.unwrap());
    }
}
