use mapsweep::commands::command_argument_builder;
use mapsweep::handlers::*;
use mapsweep_core::config::AppConfig;
use mapsweep_core::report::ReportFormat;
use mapsweep_scanner::browser::{Locator, SelectorTable};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::Level;

fn config_with(extra: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = [
        ("INPUT_SHEET_ID", "in-sheet"),
        ("OUTPUT_SHEET_ID", "out-sheet"),
        ("SHEETS_ACCESS_TOKEN", "ya29.token"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

#[test]
fn test_parse_log_level_aliases() {
    assert_eq!(parse_log_level("DEBUG"), Some(Level::DEBUG));
    assert_eq!(parse_log_level("info"), Some(Level::INFO));
    assert_eq!(parse_log_level("WARNING"), Some(Level::WARN));
    assert_eq!(parse_log_level("warn"), Some(Level::WARN));
    assert_eq!(parse_log_level("ERROR"), Some(Level::ERROR));
    assert_eq!(parse_log_level("Critical"), Some(Level::ERROR));
    assert_eq!(parse_log_level("verbose"), None);
}

#[test]
fn test_run_args_defaults() {
    let matches = command_argument_builder()
        .try_get_matches_from(["mapsweep"])
        .unwrap();
    let args = RunArgs::from_matches(&matches);

    assert!(!args.quiet);
    assert_eq!(args.max_results, None);
    assert_eq!(args.log_level, None);
    assert_eq!(args.selectors, None);
    assert_eq!(args.output, None);
    assert_eq!(args.format, ReportFormat::Text);
}

#[test]
fn test_run_args_all_flags() {
    let matches = command_argument_builder()
        .try_get_matches_from([
            "mapsweep",
            "-q",
            "--max",
            "25",
            "--log",
            "warning",
            "--selectors",
            "sel.json",
            "--env-file",
            "prod.env",
            "-o",
            "report.json",
            "-f",
            "json",
        ])
        .unwrap();
    let args = RunArgs::from_matches(&matches);

    assert!(args.quiet);
    assert_eq!(args.max_results, Some(25));
    assert_eq!(args.log_level.as_deref().and_then(parse_log_level), Some(Level::WARN));
    assert_eq!(args.selectors, Some(PathBuf::from("sel.json")));
    assert_eq!(args.env_file, Some(PathBuf::from("prod.env")));
    assert_eq!(args.output, Some(PathBuf::from("report.json")));
    assert_eq!(args.format, ReportFormat::Json);
}

#[test]
fn test_run_args_rejects_bad_values() {
    assert!(command_argument_builder()
        .try_get_matches_from(["mapsweep", "--max", "lots"])
        .is_err());
    assert!(command_argument_builder()
        .try_get_matches_from(["mapsweep", "--log", "TRACE"])
        .is_err());
    assert!(command_argument_builder()
        .try_get_matches_from(["mapsweep", "--format", "xml"])
        .is_err());
}

#[test]
fn test_load_selectors_defaults_without_file() {
    let config = config_with(&[]);
    let table = load_selectors(None, &config).unwrap();
    assert_eq!(table, SelectorTable::default());
}

#[test]
fn test_load_selectors_partial_override() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"{{"result_card": {{"by": "css", "value": "div.card"}}, "phone_aria_prefix": "Telefon:"}}"#
    )?;

    let config = config_with(&[]);
    let table = load_selectors(Some(file.path()), &config)?;

    assert_eq!(table.result_card, Locator::css("div.card"));
    assert_eq!(table.phone_aria_prefix, "Telefon:");
    assert_eq!(table.search_box, SelectorTable::default().search_box);
    Ok(())
}

#[test]
fn test_load_selectors_from_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, r#"{{"search_box": {{"by": "id", "value": "q"}}}}"#)?;
    let path = file.path().to_string_lossy().to_string();

    let config = config_with(&[("SELECTORS_FILE", path.as_str())]);
    let table = load_selectors(None, &config)?;

    assert_eq!(table.search_box, Locator::id("q"));
    Ok(())
}

#[test]
fn test_load_selectors_cli_overrides_config() -> Result<(), Box<dyn std::error::Error>> {
    let mut from_env = NamedTempFile::new()?;
    writeln!(from_env, r#"{{"search_box": {{"by": "id", "value": "env"}}}}"#)?;
    let mut from_cli = NamedTempFile::new()?;
    writeln!(from_cli, r#"{{"search_box": {{"by": "id", "value": "cli"}}}}"#)?;
    let env_path = from_env.path().to_string_lossy().to_string();

    let config = config_with(&[("SELECTORS_FILE", env_path.as_str())]);
    let table = load_selectors(Some(from_cli.path()), &config)?;

    assert_eq!(table.search_box, Locator::id("cli"));
    Ok(())
}

#[test]
fn test_load_selectors_invalid_json() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{{ not json").unwrap();

    let config = config_with(&[]);
    assert!(load_selectors(Some(file.path()), &config).is_err());
}

#[test]
fn test_load_selectors_missing_file() {
    let config = config_with(&[]);
    let missing = PathBuf::from("/nonexistent/mapsweep/selectors.json");
    assert!(load_selectors(Some(missing.as_path()), &config).is_err());
}

#[test]
fn test_build_walker_config_uses_config_timeouts() {
    let config = config_with(&[
        ("ELEMENT_WAIT_TIMEOUT", "7"),
        ("MAPS_BASE_URL", "http://127.0.0.1:8080"),
    ]);
    let walker = build_walker_config(&config, SelectorTable::default());

    assert_eq!(walker.element_timeout, Duration::from_secs(7));
    assert_eq!(walker.maps_base_url, "http://127.0.0.1:8080");
    assert_eq!(walker.selectors, SelectorTable::default());
}
