use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use mapsweep_core::config::{AppConfig, load_env_file, log_level_from_env};
use mapsweep_core::pipeline::{PipelineOptions, RunSummary, run_pipeline};
use mapsweep_core::report::{ReportFormat, generate_run_report, save_report};
use mapsweep_core::sheets::GoogleSheetsClient;
use mapsweep_core::store::RowStore;
use mapsweep_scanner::browser::SelectorTable;
use mapsweep_scanner::email::HttpEmailLookup;
use mapsweep_scanner::pacing::Pacing;
use mapsweep_scanner::retry::RetryPolicy;
use mapsweep_scanner::walker::{Walker, WalkerConfig};
use mapsweep_scanner::webdriver::WebDriverLauncher;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, info, warn};

/// Parsed command-line options.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub quiet: bool,
    pub max_results: Option<usize>,
    pub log_level: Option<String>,
    pub selectors: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: ReportFormat,
}

impl RunArgs {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            quiet: matches.get_flag("quiet"),
            max_results: matches.get_one::<usize>("max").copied(),
            log_level: matches.get_one::<String>("log").cloned(),
            selectors: matches.get_one::<PathBuf>("selectors").cloned(),
            env_file: matches.get_one::<PathBuf>("env-file").cloned(),
            output: matches.get_one::<PathBuf>("output").cloned(),
            format: matches
                .get_one::<String>("format")
                .and_then(|f| ReportFormat::from_str(f))
                .unwrap_or(ReportFormat::Text),
        }
    }
}

/// Map a console level name to a tracing level. WARNING and CRITICAL are
/// accepted as aliases for WARN and ERROR.
pub fn parse_log_level(level: &str) -> Option<Level> {
    match level.trim().to_uppercase().as_str() {
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARNING" | "WARN" => Some(Level::WARN),
        "ERROR" | "CRITICAL" => Some(Level::ERROR),
        _ => None,
    }
}

pub fn init_logging(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// `--selectors` wins over `SELECTORS_FILE`; neither means built-in selectors.
pub fn load_selectors(cli: Option<&Path>, config: &AppConfig) -> Result<SelectorTable> {
    match cli.or(config.selectors_file.as_deref()) {
        Some(path) => {
            let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
            let table = SelectorTable::from_json_file(&expanded)
                .with_context(|| format!("Failed to load selectors from {}", expanded.display()))?;
            info!("Using selectors from {}", expanded.display());
            Ok(table)
        }
        None => Ok(SelectorTable::default()),
    }
}

pub fn build_walker_config(config: &AppConfig, selectors: SelectorTable) -> WalkerConfig {
    WalkerConfig {
        selectors,
        dom_retry: RetryPolicy::dom_default(),
        pacing: Pacing::default(),
        consent_timeout: Duration::from_secs(5),
        element_timeout: config.element_wait_timeout,
        maps_base_url: config.maps_base_url.clone(),
    }
}

fn resolve_log_level(args: &RunArgs) -> Level {
    let requested = args.log_level.clone().unwrap_or_else(log_level_from_env);
    parse_log_level(&requested).unwrap_or_else(|| {
        eprintln!("Unknown log level '{}', using INFO", requested);
        Level::INFO
    })
}

pub async fn handle_run(args: &RunArgs) -> Result<RunSummary> {
    let env_path = load_env_file(args.env_file.as_deref()).context("Failed to load environment file")?;
    init_logging(resolve_log_level(args));
    if let Some(path) = env_path {
        info!("Loaded environment from {}", path.display());
    }

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let selectors = load_selectors(args.selectors.as_deref(), &config)?;
    let max_results = args.max_results.or(config.max_results_per_search);

    let sheets = GoogleSheetsClient::new(&config.sheets_api_url, &config.sheets_access_token);
    let store = RowStore::new(sheets, config.input_sheet(), config.output_sheet())
        .with_columns(config.columns.clone());

    let launcher = WebDriverLauncher::new(&config.webdriver_url)
        .with_chrome_binary(config.chrome_executable.clone())
        .with_profile_dir(config.chrome_profile_dir.clone())
        .with_page_load_timeout(config.navigation_timeout);

    let email = HttpEmailLookup::new(Duration::from_secs(10))
        .context("Failed to build the HTTP client")?;
    let walker = Walker::new(build_walker_config(&config, selectors), email);

    let options = PipelineOptions {
        max_results,
        show_progress: !args.quiet && std::io::stderr().is_terminal(),
        pacing: Pacing::default(),
    };

    let summary = run_pipeline(&store, &launcher, &walker, &options).await?;
    output_report(&summary, args)?;
    Ok(summary)
}

fn output_report(summary: &RunSummary, args: &RunArgs) -> Result<()> {
    let report = generate_run_report(summary, args.format).context("Failed to render the report")?;

    match args.output {
        Some(ref path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None if !args.quiet => print!("{}", report),
        None => {}
    }
    Ok(())
}

pub fn print_outcome(summary: &RunSummary) {
    if summary.failures.is_empty() {
        println!(
            "{} {} new row(s) from {} search term(s)",
            "✓".green().bold(),
            summary.rows_written,
            summary.terms
        );
    } else {
        warn!("{} search term(s) failed", summary.failures.len());
        println!(
            "{} {} new row(s), {} of {} search term(s) failed",
            "⚠".yellow().bold(),
            summary.rows_written,
            summary.failures.len(),
            summary.terms
        );
    }
}
