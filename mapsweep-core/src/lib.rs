use colored::Colorize;

pub mod config;
pub mod pipeline;
pub mod report;
pub mod sheets;
pub mod store;

pub use config::AppConfig;
pub use pipeline::{PipelineOptions, RunSummary, run_pipeline};
pub use sheets::{GoogleSheetsClient, MemorySheet, SheetClient};
pub use store::{InputColumns, RowStore, SheetRef};

pub fn print_banner() {
    let banner = r#"
  __ _  ___ ____  ___ _    _____ ___ ___
 /  ' \/ _ `/ _ \(_-<| |/|/ / -_) -_) _ \
/_/_/_/\_,_/ .__/___/|__,__/\__/\__/ .__/
          /_/                     /_/
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "{}",
        format!(
            "  map listings -> google sheets  v{}\n",
            env!("CARGO_PKG_VERSION")
        )
        .dimmed()
    );
}
