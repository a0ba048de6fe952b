use clap::{arg, value_parser};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("mapsweep")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("mapsweep")
        .about(
            "Reads country / city / business type triples from a Google Sheet, collects the \
            matching map listings in Chrome and appends new businesses to an output sheet.",
        )
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(--"max" <N>)
                .required(false)
                .help("Maximum results per search (default: MAX_RESULTS_PER_SEARCH, unbounded)")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--"log" <LEVEL>)
                .required(false)
                .help("Console log level (default: LOG_LEVEL or INFO)")
                .value_parser(LOG_LEVELS)
                .ignore_case(true),
        )
        .arg(
            arg!(--"selectors" <PATH>)
                .required(false)
                .help("JSON file overriding the built-in page selectors")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"env-file" <PATH>)
                .required(false)
                .help("Environment file to load (default: ./.env)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("Save the run report to a file (default: display to screen)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .help("Report format: text, json")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
}
