mod browser;
mod collectors;
mod config;
mod error;
mod logging;
mod models;
mod settings;
mod storage;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use crate::config::{Command, Config};
use crate::settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    logging::init(config.verbose);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let command = config
        .resolved_command()
        .context("error during program initialization: no site or command given")?;

    match command {
        Command::InitConfig { path, force } => {
            settings::write_sample(&path, force).context("error during program initialization")?;
        }
        Command::Scrape { site, config_file } => {
            let settings = Settings::from_file(&config_file, site)
                .context("error during program initialization")?;
            collectors::runner::run(&settings)
                .await
                .context("error during program execution")?;
        }
    }
    Ok(())
}
