use std::fmt;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

pub const DEFAULT_CONFIG_FILE: &str = "scrape-jobs.ini";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "scrape-jobs",
    version,
    about = "Scrape jobs and store results",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Config {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Site to scrape
    #[arg(value_enum, required = true)]
    pub site: Option<Site>,

    /// Path to the .ini config file
    #[arg(env = "SCRAPE_JOBS_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scrape a site and upload new jobs (default when a site is given)
    #[command(hide = true)]
    Scrape { site: Site, config_file: PathBuf },
    /// Write a sample config file
    InitConfig {
        /// Destination of the sample file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    #[value(name = "seek.com.au")]
    Seek,
    #[value(name = "linkedin.com")]
    Linkedin,
}

impl Site {
    /// Name of the config section holding this site's settings.
    pub fn section(self) -> &'static str {
        match self {
            Site::Seek => "seek.com.au",
            Site::Linkedin => "linkedin.com",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

impl Config {
    /// Resolve the command, defaulting to Scrape when a site was given.
    pub fn resolved_command(&self) -> Option<Command> {
        match (&self.command, self.site) {
            (Some(command), _) => Some(command.clone()),
            (None, Some(site)) => Some(Command::Scrape {
                site,
                config_file: self.config_file.clone(),
            }),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn help_lists_only_init_config() {
        let help = Config::command().render_help().to_string();
        assert!(help.contains("init-config"), "{help}");
        assert!(!help.contains("Scrape a site"), "{help}");
    }

    #[test]
    fn site_and_config_file_resolve_to_scrape() {
        let config =
            Config::try_parse_from(["scrape-jobs", "-vv", "seek.com.au", "custom.ini"]).unwrap();
        assert_eq!(config.verbose, 2);
        assert_eq!(
            config.resolved_command(),
            Some(Command::Scrape {
                site: Site::Seek,
                config_file: PathBuf::from("custom.ini"),
            })
        );
    }

    #[test]
    fn config_file_defaults_to_working_directory_ini() {
        let config = Config::try_parse_from(["scrape-jobs", "linkedin.com"]).unwrap();
        match config.resolved_command() {
            Some(Command::Scrape { site, config_file }) => {
                assert_eq!(site, Site::Linkedin);
                // SCRAPE_JOBS_CONFIG may be set in the environment running the tests
                if std::env::var_os("SCRAPE_JOBS_CONFIG").is_none() {
                    assert_eq!(config_file, PathBuf::from(DEFAULT_CONFIG_FILE));
                }
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_site_is_rejected() {
        assert!(Config::try_parse_from(["scrape-jobs", "indeed.com"]).is_err());
    }

    #[test]
    fn site_is_required_without_subcommand() {
        assert!(Config::try_parse_from(["scrape-jobs"]).is_err());
    }

    #[test]
    fn init_config_subcommand() {
        let config = Config::try_parse_from(["scrape-jobs", "init-config", "--force"]).unwrap();
        assert_eq!(
            config.resolved_command(),
            Some(Command::InitConfig {
                path: PathBuf::from(DEFAULT_CONFIG_FILE),
                force: true,
            })
        );
    }

    #[test]
    fn site_section_names() {
        assert_eq!(Site::Seek.section(), "seek.com.au");
        assert_eq!(Site::Linkedin.to_string(), "linkedin.com");
    }
}
