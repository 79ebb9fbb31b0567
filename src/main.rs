//! Entry point for the `capsync` batch uploader.

use std::process::ExitCode;

use capsync::cli::{self, Cli};
use capsync::logging;
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init("capsync", cli.verbose) {
        eprintln!("Logging disabled: {err}");
    }
    match cli::run_coordinator(&cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "capsync failed");
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
