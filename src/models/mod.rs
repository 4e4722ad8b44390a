pub mod job;
pub mod linkedin_job;
pub mod run_summary;
pub mod seek_job;
