use crate::store::{InputColumns, SheetRef};
use mapsweep_scanner::error::{Result, SweepError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Run configuration read from environment variables (and an optional
/// `.env` file).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // Sheets
    pub input_sheet_id: String,
    pub output_sheet_id: String,
    pub input_tab: String,
    pub output_tab: String,
    pub columns: InputColumns,
    pub sheets_access_token: String,
    pub sheets_api_url: String,

    // Browser
    pub webdriver_url: String,
    pub chrome_executable: Option<String>,
    pub chrome_profile_dir: Option<String>,
    pub maps_base_url: String,
    pub selectors_file: Option<PathBuf>,
    pub navigation_timeout: Duration,
    pub element_wait_timeout: Duration,

    // Run
    pub max_results_per_search: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            get(key).ok_or_else(|| SweepError::Config(format!("{} is not set", key)))
        };
        let seconds = |key: &str, default: u64| -> Result<Duration> {
            match get(key) {
                Some(v) => v.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    SweepError::Config(format!("{} must be a whole number of seconds, got '{}'", key, v))
                }),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let config = Self {
            input_sheet_id: required("INPUT_SHEET_ID")?,
            output_sheet_id: required("OUTPUT_SHEET_ID")?,
            input_tab: or("INPUT_TAB", "Input"),
            output_tab: or("OUTPUT_TAB", "Scraped"),
            columns: InputColumns {
                country: or("COL_COUNTRY", "country_name"),
                city: or("COL_CITY", "city_name"),
                business_type: or("COL_BUSINESS", "business_type"),
            },
            sheets_access_token: required("SHEETS_ACCESS_TOKEN")?,
            sheets_api_url: or("SHEETS_API_URL", "https://sheets.googleapis.com"),
            webdriver_url: or("WEBDRIVER_URL", "http://localhost:9515"),
            chrome_executable: get("CHROME_EXECUTABLE"),
            chrome_profile_dir: Some(or("CHROME_PROFILE_DIR", "~/.cache/mapsweep-chrome")),
            maps_base_url: or("MAPS_BASE_URL", "https://www.google.com"),
            selectors_file: get("SELECTORS_FILE").map(PathBuf::from),
            navigation_timeout: seconds("NAVIGATION_TIMEOUT", 20)?,
            element_wait_timeout: seconds("ELEMENT_WAIT_TIMEOUT", 15)?,
            max_results_per_search: parse_max_results(get("MAX_RESULTS_PER_SEARCH").as_deref())?,
        };

        config.log_keys();
        Ok(config)
    }

    pub fn input_sheet(&self) -> SheetRef {
        SheetRef::new(&self.input_sheet_id, &self.input_tab)
    }

    pub fn output_sheet(&self) -> SheetRef {
        SheetRef::new(&self.output_sheet_id, &self.output_tab)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{}...({} chars)", head, val.chars().count())
        }

        info!("Config loaded:");
        info!("  INPUT_SHEET_ID: {} ({})", self.input_sheet_id, self.input_tab);
        info!("  OUTPUT_SHEET_ID: {} ({})", self.output_sheet_id, self.output_tab);
        info!("  SHEETS_ACCESS_TOKEN: {}", preview(&self.sheets_access_token));
        info!("  WEBDRIVER_URL: {}", self.webdriver_url);
        debug!("  MAX_RESULTS_PER_SEARCH: {:?}", self.max_results_per_search);
    }
}

/// Load `env_file` (or `./.env` when `None`) into the process environment.
/// Variables that are already set keep their values. A missing default
/// `.env` is not an error; a missing explicit file is.
pub fn load_env_file(env_file: Option<&Path>) -> Result<Option<PathBuf>> {
    match env_file {
        Some(path) => {
            let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
            dotenvy::from_path(&expanded).map_err(|e| {
                SweepError::Config(format!("Cannot load {}: {}", expanded.display(), e))
            })?;
            Ok(Some(expanded))
        }
        None => Ok(dotenvy::dotenv().ok()),
    }
}

/// Console log level from `LOG_LEVEL`, upper-cased, `INFO` when unset.
/// Not part of [`AppConfig`]: logging is initialised before the config is read.
pub fn log_level_from_env() -> String {
    log_level_from_lookup(|key| std::env::var(key).ok())
}

pub fn log_level_from_lookup<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_LEVEL")
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "INFO".to_string())
}

/// `None`, `""` and `"None"` mean no cap.
pub fn parse_max_results(value: Option<&str>) -> Result<Option<usize>> {
    match value.map(str::trim) {
        None | Some("") | Some("None") => Ok(None),
        Some(v) => v.parse::<usize>().map(Some).map_err(|_| {
            SweepError::Config(format!("MAX_RESULTS_PER_SEARCH must be a number, got '{}'", v))
        }),
    }
}
