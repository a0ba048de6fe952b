pub mod commands;
pub mod handlers;

pub use handlers::{RunArgs, handle_run, load_selectors, parse_log_level};
