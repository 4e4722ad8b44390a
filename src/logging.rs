use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Level directive for the `-v` count; no flag keeps the info default.
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 | 1 => "scrape_jobs=info",
        _ => "scrape_jobs=debug",
    }
}

/// Log file for this run in the system temp dir, e.g. `scrape-jobs_20240131_081500.log`.
pub fn log_file_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    std::env::temp_dir().join(format!("scrape-jobs_{stamp}.log"))
}

/// Install the console + file subscriber. Returns the log file path, if one could be created.
pub fn init(verbose: u8) -> Option<PathBuf> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbose)))
    };

    let path = log_file_path();
    let file_layer = File::create(&path).ok().map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(filter())
    });
    let created = file_layer.is_some();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
        .with(file_layer)
        .init();

    if created {
        tracing::info!("Initialized log file at: {}", path.display());
        Some(path)
    } else {
        tracing::warn!("Could not create log file at: {}", path.display());
        None
    }
}
