use colored::Colorize;
use mapsweep::commands::command_argument_builder;
use mapsweep::handlers::{RunArgs, handle_run, print_outcome};
use mapsweep_core::print_banner;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let matches = cmd.get_matches();
    let args = RunArgs::from_matches(&matches);

    // Show banner unless --quiet flag is set
    if !args.quiet {
        print_banner();
    }

    let code = tokio::select! {
        outcome = handle_run(&args) => match outcome {
            Ok(summary) => {
                if !args.quiet {
                    print_outcome(&summary);
                }
                0
            }
            Err(e) => {
                error!("Run aborted: {:#}", e);
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted by user");
            eprintln!("\n{}", "Interrupted by user".yellow());
            130
        }
    };

    std::process::exit(code);
}
