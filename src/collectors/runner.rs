use std::path::Path;

use chrono::{DateTime, Utc};

use crate::browser::{ChromeDriver, ERROR_PAGE_SOURCE, ERROR_SCREENSHOT, PageDriver};
use crate::collectors::linkedin::LinkedinPage;
use crate::collectors::pagination::{self, Collected, StopReason};
use crate::collectors::recency::MaxPostAge;
use crate::collectors::seek::SeekPage;
use crate::collectors::{ResultsControl, SearchControl};
use crate::error::AppError;
use crate::models::job::{JobRecord, RowFormatter, url_column};
use crate::models::linkedin_job::LinkedinJob;
use crate::models::run_summary::RunSummary;
use crate::models::seek_job::SeekJob;
use crate::settings::{SearchParams, Settings, TimeSettings};
use crate::storage::{self, JobStore, Uploader};

/// Scrape one site end to end and upload what is new.
///
/// The store is checked before the browser starts, so a run that could not
/// persist anything fails fast. A collection that stopped on an error still
/// uploads its partial result before the error is returned.
pub async fn run(settings: &Settings) -> Result<RunSummary, AppError> {
    let mut summary = RunSummary::start(settings.site.section());
    let result = execute(settings, &mut summary).await;
    if let Err(e) = &result {
        summary.mark_failed(&e.to_string());
    }
    summary.finish();
    result.map(|()| summary)
}

async fn execute(settings: &Settings, summary: &mut RunSummary) -> Result<(), AppError> {
    let store = storage::open_store(&settings.upload)?;
    let columns = match settings.search {
        SearchParams::Seek { .. } => SeekJob::columns(),
        SearchParams::Linkedin { .. } => LinkedinJob::columns(),
    };
    tracing::info!("Checking {} is ready for upload...", store.name());
    store.check_ready(columns).await?;

    let max_age = MaxPostAge::new(settings.max_post_age_days)?;
    let driver = ChromeDriver::launch(settings.driver_headless).await?;
    scrape_with(&driver, settings, &max_age, store.as_ref(), Path::new("."), summary).await
}

/// Search and collect on `driver`, quit it, then publish. The driver is quit
/// on every path, including a page that could not be built.
pub async fn scrape_with<D: PageDriver + ?Sized>(
    driver: &D,
    settings: &Settings,
    max_age: &MaxPostAge,
    store: &dyn JobStore,
    artifacts_dir: &Path,
    summary: &mut RunSummary,
) -> Result<(), AppError> {
    let stale = settings.max_stale_pages;
    match &settings.search {
        SearchParams::Seek { what, r#where } => {
            let page = SeekPage::new(driver, what, r#where);
            let collected = search_and_collect(&page, driver, max_age, stale, artifacts_dir).await;
            quit(driver).await;
            publish(collected, store, &settings.time, summary).await
        }
        SearchParams::Linkedin {
            keywords,
            location,
            date_posted,
        } => {
            let collected = match LinkedinPage::new(driver, keywords, location, date_posted) {
                Ok(page) => search_and_collect(&page, driver, max_age, stale, artifacts_dir).await,
                Err(e) => Collected::aborted(e),
            };
            quit(driver).await;
            publish(collected, store, &settings.time, summary).await
        }
    }
}

async fn quit<D: PageDriver + ?Sized>(driver: &D) {
    if let Err(e) = driver.quit().await {
        tracing::warn!("Browser did not shut down cleanly: {e}");
    }
}

async fn search<P: SearchControl + ?Sized>(page: &P) -> Result<(), AppError> {
    page.open().await?;
    page.set_params().await?;
    page.trigger_search().await?;
    page.wait_for_search_complete().await
}

/// Search, then walk the results. Any failure leaves a screenshot and the
/// page source in `artifacts_dir`.
pub async fn search_and_collect<P, D>(
    page: &P,
    driver: &D,
    max_age: &MaxPostAge,
    max_stale_pages: u32,
    artifacts_dir: &Path,
) -> Collected<P::Record>
where
    P: SearchControl + ResultsControl + ?Sized,
    D: PageDriver + ?Sized,
{
    tracing::info!(
        "Scraping {} for posts from the last {} day(s) (since {})...",
        page.name(),
        max_age.days(),
        max_age.cutoff()
    );
    let collected = match search(page).await {
        Ok(()) => pagination::collect(page, |r| max_age.is_recent(r), max_stale_pages).await,
        Err(e) => {
            tracing::error!("Search on {} failed: {e}", page.name());
            Collected::aborted(e)
        }
    };

    if collected.stop.is_failure() {
        driver
            .save_artifacts(
                &artifacts_dir.join(ERROR_SCREENSHOT),
                &artifacts_dir.join(ERROR_PAGE_SOURCE),
            )
            .await;
    }
    collected
}

/// Drop already-stored records, format the rest and upload them.
/// Returns the collection error, if any, after the upload. When the upload
/// fails too, both errors are reported.
pub async fn publish<R: JobRecord>(
    collected: Collected<R>,
    store: &dyn JobStore,
    time: &TimeSettings,
    summary: &mut RunSummary,
) -> Result<(), AppError> {
    let Collected {
        records,
        pages,
        stop,
    } = collected;
    summary.pages = pages;
    summary.jobs_found = records.len();
    summary.stop_reason = match &stop {
        StopReason::Failed(_) => "error".to_string(),
        other => other.to_string(),
    };
    if let StopReason::Failed(e) = &stop {
        tracing::error!(
            "Collection stopped early, uploading {} record(s) collected before: {e}",
            records.len()
        );
    }

    let uploaded = upload_new(records, store, time, summary).await;
    match (stop, uploaded) {
        (StopReason::Failed(collect_err), Err(upload_err)) => Err(AppError::Upload(format!(
            "could not upload the partial result ({upload_err}) after collection failed: {collect_err}"
        ))),
        (StopReason::Failed(collect_err), Ok(())) => Err(collect_err),
        (_, uploaded) => uploaded,
    }
}

async fn upload_new<R: JobRecord>(
    records: Vec<R>,
    store: &dyn JobStore,
    time: &TimeSettings,
    summary: &mut RunSummary,
) -> Result<(), AppError> {
    let uploader = Uploader::new(store, url_column::<R>());
    let known = uploader.known_urls().await?;
    let new_records: Vec<R> = records
        .into_iter()
        .filter(|r| !known.contains(r.url()))
        .collect();
    tracing::info!(
        "Known: {}, collected: {}, new: {}",
        known.len(),
        summary.jobs_found,
        new_records.len()
    );
    summary.jobs_new = new_records.len();

    let formatter = RowFormatter::new(time, scraped_at(summary));
    tracing::debug!("Stamping rows with scraped_time '{}'", formatter.scraped_stamp());
    summary.jobs_uploaded = uploader.upload(formatter.rows(&new_records)).await?;
    Ok(())
}

/// One scrape stamp per run: when it started.
fn scraped_at(summary: &RunSummary) -> DateTime<Utc> {
    summary.started_at
}
