use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use ini::{Ini, ParseOption, Properties};

use crate::collectors::linkedin::DATE_POSTED_CHOICES;
use crate::config::Site;
use crate::error::AppError;

const DEFAULT_SECTION: &str = "DEFAULT";

/// The sample config written by `init-config` and quoted by config errors.
pub const SAMPLE_CONFIG: &str = r"[DEFAULT]
upload_spreadsheet_name = jobs_stats_data
upload_spreadsheet_json = Replace with path to the service-account secrets.json file
upload_worksheet_index = 0
max_post_age_days = 3
timezone = Australia/Sydney
scraped_timestamp_format = %Y-%m-%d %H:%M
posted_timestamp_format = %Y-%m-%d
driver_headless = true
max_stale_pages = 2

[seek.com.au]
what = Replace with search query
where = All Sydney NSW

[linkedin.com]
keywords = Replace with search query
location = Sydney, New South Wales, Australia
date_posted = Past Month
upload_worksheet_index = 1
";

/// Everything a scrape run needs, resolved for a single site.
#[derive(Debug, Clone)]
pub struct Settings {
    pub site: Site,
    pub upload: UploadSettings,
    pub time: TimeSettings,
    pub search: SearchParams,
    pub max_post_age_days: i64,
    pub max_stale_pages: u32,
    pub driver_headless: bool,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub spreadsheet_name: String,
    pub credentials_file: PathBuf,
    pub worksheet_index: usize,
    /// When set, rows go to this CSV file instead of the spreadsheet.
    pub csv_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TimeSettings {
    /// `None` means the local zone.
    pub timezone: Option<Tz>,
    pub scraped_format: String,
    pub posted_format: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchParams {
    Seek {
        what: String,
        r#where: String,
    },
    Linkedin {
        keywords: String,
        location: String,
        date_posted: String,
    },
}

impl Settings {
    pub fn from_file(path: &Path, site: Site) -> Result<Settings, AppError> {
        tracing::info!("Reading '{site}' config from file: '{}'", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        Self::parse(&contents, site)
    }

    pub fn parse(contents: &str, site: Site) -> Result<Settings, AppError> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(contents, options)?;
        let section = Section::new(&ini, site.section())?;

        let upload = UploadSettings {
            spreadsheet_name: section.required("upload_spreadsheet_name")?,
            credentials_file: PathBuf::from(section.required("upload_spreadsheet_json")?),
            worksheet_index: section.parsed("upload_worksheet_index")?,
            csv_file: section.optional("upload_csv_file").map(PathBuf::from),
        };

        let time = TimeSettings {
            timezone: section.timezone("timezone")?,
            scraped_format: section.timestamp_format("scraped_timestamp_format")?,
            posted_format: section.timestamp_format("posted_timestamp_format")?,
        };

        let search = match site {
            Site::Seek => SearchParams::Seek {
                what: section.required("what")?,
                r#where: section.required("where")?,
            },
            Site::Linkedin => SearchParams::Linkedin {
                keywords: section.required("keywords")?,
                location: section.required("location")?,
                date_posted: section.choice("date_posted", DATE_POSTED_CHOICES)?,
            },
        };

        let max_post_age_days: i64 = section.parsed("max_post_age_days")?;
        if max_post_age_days <= 0 {
            return Err(section.invalid("max_post_age_days", "must be greater than zero"));
        }

        let max_stale_pages: u32 = match section.optional("max_stale_pages") {
            Some(_) => section.parsed("max_stale_pages")?,
            None => 2,
        };
        if max_stale_pages == 0 {
            return Err(section.invalid("max_stale_pages", "must be at least 1"));
        }

        let driver_headless = match section.optional("driver_headless") {
            Some(_) => section.flag("driver_headless")?,
            None => true,
        };

        let settings = Settings {
            site,
            upload,
            time,
            search,
            max_post_age_days,
            max_stale_pages,
            driver_headless,
        };
        tracing::debug!("Got settings: {settings:?}");
        Ok(settings)
    }
}

/// A site section with `[DEFAULT]` fallback, mirroring ConfigParser lookup.
struct Section<'a> {
    name: &'a str,
    own: &'a Properties,
    defaults: Option<&'a Properties>,
}

impl<'a> Section<'a> {
    fn new(ini: &'a Ini, name: &'a str) -> Result<Section<'a>, AppError> {
        let own = ini
            .section(Some(name))
            .ok_or_else(|| AppError::config(format!("No '[{name}]' section in config file")))?;
        Ok(Section {
            name,
            own,
            defaults: ini.section(Some(DEFAULT_SECTION)),
        })
    }

    fn optional(&self, key: &str) -> Option<&'a str> {
        self.own
            .get(key)
            .or_else(|| self.defaults.and_then(|d| d.get(key)))
            .map(str::trim)
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.optional(key).map(String::from).ok_or_else(|| {
            AppError::config(format!(
                "No value for '{key}=' in '[{}]' section",
                self.name
            ))
        })
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<T, AppError> {
        let raw = self.required(key)?;
        raw.parse()
            .map_err(|_| self.invalid(key, &format!("'{raw}' is not a valid number")))
    }

    fn choice(&self, key: &str, choices: &[&str]) -> Result<String, AppError> {
        let raw = self.required(key)?;
        if choices.iter().any(|c| c.eq_ignore_ascii_case(&raw)) {
            Ok(raw)
        } else {
            Err(self.invalid(key, &format!("'{raw}' is not one of {}", choices.join(", "))))
        }
    }

    fn flag(&self, key: &str) -> Result<bool, AppError> {
        let raw = self.required(key)?;
        match raw.to_ascii_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Ok(true),
            "0" | "no" | "false" | "off" => Ok(false),
            _ => Err(self.invalid(key, &format!("'{raw}' is not a boolean"))),
        }
    }

    fn timezone(&self, key: &str) -> Result<Option<Tz>, AppError> {
        let raw = self.required(key)?;
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<Tz>()
            .map(Some)
            .map_err(|e| self.invalid(key, &format!("unknown timezone '{raw}' ({e})")))
    }

    fn timestamp_format(&self, key: &str) -> Result<String, AppError> {
        let raw = self.required(key)?;
        if raw.is_empty() || StrftimeItems::new(&raw).any(|item| matches!(item, Item::Error)) {
            return Err(self.invalid(key, &format!("'{raw}' is not a valid timestamp format")));
        }
        Ok(raw)
    }

    fn invalid(&self, key: &str, reason: &str) -> AppError {
        AppError::config(format!(
            "Invalid value for '{key}=' in '[{}]' section: {reason}",
            self.name
        ))
    }
}

/// Write the sample config, refusing to clobber an existing file unless forced.
pub fn write_sample(path: &Path, force: bool) -> Result<(), AppError> {
    if path.exists() && !force {
        return Err(AppError::InvalidArgument(format!(
            "'{}' already exists (use --force to overwrite)",
            path.display()
        )));
    }
    std::fs::write(path, SAMPLE_CONFIG)?;
    tracing::info!("Created sample config file at: '{}'", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_is_valid_for_every_site() {
        let seek = Settings::parse(SAMPLE_CONFIG, Site::Seek).unwrap();
        assert_eq!(seek.upload.worksheet_index, 0);
        assert_eq!(seek.max_post_age_days, 3);
        assert_eq!(seek.max_stale_pages, 2);
        assert!(seek.driver_headless);
        assert_eq!(seek.time.timezone, Some(chrono_tz::Australia::Sydney));
        assert_eq!(
            seek.search,
            SearchParams::Seek {
                what: "Replace with search query".to_string(),
                r#where: "All Sydney NSW".to_string(),
            }
        );

        let linkedin = Settings::parse(SAMPLE_CONFIG, Site::Linkedin).unwrap();
        // site section overrides DEFAULT
        assert_eq!(linkedin.upload.worksheet_index, 1);
        assert_eq!(linkedin.upload.spreadsheet_name, "jobs_stats_data");
        assert!(matches!(
            linkedin.search,
            SearchParams::Linkedin { ref date_posted, .. } if date_posted == "Past Month"
        ));
    }

    #[test]
    fn missing_key_reports_key_section_and_sample() {
        let contents = SAMPLE_CONFIG.replace("what = Replace with search query\n", "");
        let err = Settings::parse(&contents, Site::Seek).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No value for 'what=' in '[seek.com.au]' section"), "{msg}");
        assert!(msg.contains("-----------SAMPLE START-----------"));
        assert!(msg.contains("[linkedin.com]"));
    }

    #[test]
    fn missing_section_is_a_config_error() {
        let contents = "[DEFAULT]\nupload_spreadsheet_name = x\n";
        let err = Settings::parse(contents, Site::Linkedin).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
        assert!(err.to_string().contains("No '[linkedin.com]' section"));
    }

    #[test]
    fn max_post_age_days_must_be_a_positive_integer() {
        for bad in ["0", "-2", "2.5", "three"] {
            let contents =
                SAMPLE_CONFIG.replace("max_post_age_days = 3", &format!("max_post_age_days = {bad}"));
            let err = Settings::parse(&contents, Site::Seek).unwrap_err();
            assert!(
                err.to_string().contains("'max_post_age_days='"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn empty_timezone_means_local() {
        let contents = SAMPLE_CONFIG.replace("timezone = Australia/Sydney", "timezone =");
        let settings = Settings::parse(&contents, Site::Seek).unwrap();
        assert_eq!(settings.time.timezone, None);
    }

    #[test]
    fn date_posted_must_be_a_filter_label() {
        let contents = SAMPLE_CONFIG.replace("date_posted = Past Month", "date_posted = Yesterday");
        let err = Settings::parse(&contents, Site::Linkedin).unwrap_err();
        assert!(err.to_string().contains("'Yesterday' is not one of"), "{err}");

        let contents = SAMPLE_CONFIG.replace("date_posted = Past Month", "date_posted = past 24 hours");
        assert!(Settings::parse(&contents, Site::Linkedin).is_ok());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let contents = SAMPLE_CONFIG.replace("Australia/Sydney", "Mars/Olympus");
        let err = Settings::parse(&contents, Site::Seek).unwrap_err();
        assert!(err.to_string().contains("unknown timezone 'Mars/Olympus'"));
    }

    #[test]
    fn broken_timestamp_format_is_rejected() {
        let contents = SAMPLE_CONFIG.replace("%Y-%m-%d %H:%M", "%Y-%m-%d %Q");
        let err = Settings::parse(&contents, Site::Seek).unwrap_err();
        assert!(err.to_string().contains("scraped_timestamp_format"));
    }

    #[test]
    fn optional_keys_have_defaults_and_overrides() {
        let contents = SAMPLE_CONFIG
            .replace("driver_headless = true\n", "")
            .replace("max_stale_pages = 2\n", "")
            .replace(
                "where = All Sydney NSW\n",
                "where = All Sydney NSW\nmax_stale_pages = 1\ndriver_headless = no\nupload_csv_file = C:\\jobs\\seek.csv\n",
            );
        let settings = Settings::parse(&contents, Site::Seek).unwrap();
        assert_eq!(settings.max_stale_pages, 1);
        assert!(!settings.driver_headless);
        // backslashes survive because escapes are disabled
        assert_eq!(
            settings.upload.csv_file,
            Some(PathBuf::from("C:\\jobs\\seek.csv"))
        );

        let linkedin = Settings::parse(&contents, Site::Linkedin).unwrap();
        assert_eq!(linkedin.max_stale_pages, 2);
        assert!(linkedin.driver_headless);
        assert_eq!(linkedin.upload.csv_file, None);
    }

    #[test]
    fn zero_stale_pages_is_rejected() {
        let contents = SAMPLE_CONFIG.replace("max_stale_pages = 2", "max_stale_pages = 0");
        assert!(Settings::parse(&contents, Site::Seek).is_err());
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let err = Settings::from_file(Path::new("/definitely/not/here.ini"), Site::Seek)
            .unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }
}
