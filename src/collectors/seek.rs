use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::browser::PageDriver;
use crate::collectors::html::{attr_of, canonical_url, has_match, selector, text_of};
use crate::collectors::{ResultsControl, SearchControl};
use crate::error::AppError;
use crate::models::seek_job::SeekJob;

const HOME_URL: &str = "https://www.seek.com.au/";

const KEYWORDS_INPUT: &str = "#keywords-input";
const WHERE_INPUT: &str = "input#SearchBar__Where";
const WHERE_SUGGESTION: &str = "div[id*='react-autowhatever'] ul > li";
const SEARCH_BUTTON: &str = "button[data-automation='searchButton']";
const RESULTS_CONTAINER: &str = "div[data-automation='searchResults']";
const RESULT_ITEM: &str = "div[data-automation='searchResults'] article";
const SORT_BY_LABEL: &str = "label[id*='sortby-label'], label#SortedByLabel";
const SORT_BY_OPTION: &str = "ul[aria-label='Sort By'] li, [role='listbox'] [role='option']";
const NEXT_PAGE: &str = "a[data-automation='page-next']";

const CARD: &str = "article";
const TITLE_LINK: &str = "a[data-automation='jobTitle'], h1 > a";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const SUGGESTION_TIMEOUT: Duration = Duration::from_secs(5);
const NEXT_PAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// "45m ago", "3d ago", "30+d ago", "2mo ago"
static LISTING_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\+?\s*(mo|[smhdwy])").expect("listing age pattern is valid")
});

/// seek.com.au search and results, driven through a borrowed browser page.
pub struct SeekPage<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    what: String,
    r#where: String,
}

impl<'a, D: PageDriver + ?Sized> SeekPage<'a, D> {
    pub fn new(driver: &'a D, what: &str, r#where: &str) -> Self {
        SeekPage {
            driver,
            what: what.to_string(),
            r#where: r#where.to_string(),
        }
    }

    async fn sort_by_date(&self) -> Result<(), AppError> {
        tracing::info!("Sorting results by 'Date'");
        self.driver.click(SORT_BY_LABEL).await?;
        self.driver.click_text(SORT_BY_OPTION, "Date").await?;
        self.driver
            .require_visible(RESULTS_CONTAINER, SEARCH_TIMEOUT)
            .await
    }
}

#[async_trait]
impl<D: PageDriver + ?Sized> SearchControl for SeekPage<'_, D> {
    fn name(&self) -> &str {
        "seek.com.au"
    }

    async fn open(&self) -> Result<(), AppError> {
        tracing::info!("Opening {HOME_URL}");
        self.driver.goto(HOME_URL).await?;
        self.driver
            .require_visible(KEYWORDS_INPUT, SEARCH_TIMEOUT)
            .await
    }

    async fn set_params(&self) -> Result<(), AppError> {
        tracing::info!("Setting search 'what' to '{}'", self.what);
        self.driver.type_text(KEYWORDS_INPUT, &self.what).await?;

        tracing::info!("Setting search 'where' to '{}'", self.r#where);
        self.driver.type_text(WHERE_INPUT, &self.r#where).await?;
        self.driver
            .require_visible(WHERE_SUGGESTION, SUGGESTION_TIMEOUT)
            .await?;
        self.driver.click(WHERE_SUGGESTION).await
    }

    async fn trigger_search(&self) -> Result<(), AppError> {
        tracing::info!("Triggering search...");
        self.driver.click(SEARCH_BUTTON).await
    }

    async fn wait_for_search_complete(&self) -> Result<(), AppError> {
        tracing::info!("Waiting for search to complete...");
        self.driver
            .require_visible(RESULTS_CONTAINER, SEARCH_TIMEOUT)
            .await?;
        self.sort_by_date().await
    }
}

#[async_trait]
impl<D: PageDriver + ?Sized> ResultsControl for SeekPage<'_, D> {
    type Record = SeekJob;

    async fn has_results(&self) -> Result<bool, AppError> {
        self.driver.is_visible(RESULT_ITEM).await
    }

    async fn has_next_page(&self) -> Result<bool, AppError> {
        self.driver.wait_visible(NEXT_PAGE, NEXT_PAGE_TIMEOUT).await
    }

    async fn visible_records(&self) -> Result<Vec<SeekJob>, AppError> {
        let html = self.driver.content().await?;
        let jobs = parse_jobs(&html, Utc::now());
        tracing::info!("Got ({}) visible results on current page", jobs.len());
        Ok(jobs)
    }

    async fn advance_page(&self) -> Result<(), AppError> {
        tracing::info!("Moving to next results page...");
        self.driver.scroll_to_bottom().await?;
        self.driver.click(NEXT_PAGE).await?;
        self.driver.require_visible(RESULT_ITEM, SEARCH_TIMEOUT).await
    }
}

/// Extract every job card from a rendered results page. `now` anchors the
/// relative listing ages.
pub fn parse_jobs(html: &str, now: DateTime<Utc>) -> Vec<SeekJob> {
    let document = Html::parse_document(html);
    let Some(card_selector) = selector(CARD) else {
        return Vec::new();
    };
    document
        .select(&card_selector)
        .filter_map(|card| parse_card(card, now))
        .collect()
}

fn parse_card(card: ElementRef<'_>, now: DateTime<Utc>) -> Option<SeekJob> {
    let Some(url) = attr_of(card, TITLE_LINK, "href").and_then(|href| canonical_url(HOME_URL, &href))
    else {
        tracing::debug!("Skipping seek card without a job link");
        return None;
    };

    let field = |automation: &str| text_of(card, &format!("[data-automation='{automation}']"));
    let posted_time = field("jobListingDate").and_then(|age| parse_listing_age(&age, now));

    Some(SeekJob {
        url,
        posted_time,
        title: text_of(card, TITLE_LINK),
        company: field("jobCompany"),
        location: field("jobLocation"),
        area: field("jobArea"),
        classification: field("jobClassification"),
        sub_classification: field("jobSubClassification"),
        salary: field("jobSalary"),
        featured: has_match(card, "[data-automation='jobPremium']"),
    })
}

/// Turn a relative listing age into an absolute instant before `now`.
pub fn parse_listing_age(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = LISTING_AGE.captures(text)?;
    let amount: i64 = caps[1].parse().ok()?;
    let unit_seconds = match caps[2].to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        "mo" => 30 * 24 * 60 * 60,
        "y" => 365 * 24 * 60 * 60,
        _ => return None,
    };
    let age = chrono::Duration::try_seconds(amount.checked_mul(unit_seconds)?)?;
    now.checked_sub_signed(age)
}
