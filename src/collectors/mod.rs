// Collectors drive one job board through search and pagination.
// Each site implements the two capabilities below by composing a PageDriver.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::job::JobRecord;

mod html;
pub mod linkedin;
pub mod pagination;
pub mod recency;
pub mod runner;
pub mod seek;

/// Getting a site from its landing page to a populated results list.
#[async_trait]
pub trait SearchControl: Send + Sync {
    /// Human-readable site name, used in logs.
    fn name(&self) -> &str;

    /// Navigate to the site's jobs page.
    async fn open(&self) -> Result<(), AppError>;

    /// Fill in the search form from the configured parameters.
    async fn set_params(&self) -> Result<(), AppError>;

    async fn trigger_search(&self) -> Result<(), AppError>;

    /// Block (bounded) until the results container is rendered.
    async fn wait_for_search_complete(&self) -> Result<(), AppError>;
}

/// Reading and paging through a rendered results list.
#[async_trait]
pub trait ResultsControl: Send + Sync {
    type Record: JobRecord;

    async fn has_results(&self) -> Result<bool, AppError>;

    async fn has_next_page(&self) -> Result<bool, AppError>;

    /// Parse every record currently visible. Records without a URL are skipped.
    async fn visible_records(&self) -> Result<Vec<Self::Record>, AppError>;

    /// Move to the next page and wait for it to render.
    async fn advance_page(&self) -> Result<(), AppError>;
}
