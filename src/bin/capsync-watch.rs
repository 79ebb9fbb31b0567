//! Watches a directory and uploads capture folders as they are created.

use std::process::ExitCode;

use capsync::cli::{self, WatchCli};
use capsync::logging;
use clap::Parser;

fn main() -> ExitCode {
    let cli = WatchCli::parse();
    if let Err(err) = logging::init("capsync-watch", cli.verbose) {
        eprintln!("Logging disabled: {err}");
    }
    match cli::run_watcher(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Watcher stopped");
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
