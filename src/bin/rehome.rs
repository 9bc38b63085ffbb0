//! Rehome CLI Binary
//!
//! Sweeps every store hive, rewrites stale home-directory paths, prints the
//! match report, and waits for an acknowledgment so the summary stays
//! visible when the tool is launched from a desktop shell.

use clap::Parser;
use rehome::error::ToolError;
use rehome::logging::init_logging;
use rehome::tooling::cli::{Cli, CliContext, EXIT_ROOT_OPEN_FAILED};
use std::process;

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(context.logging())) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    match context.execute() {
        Ok(output) => {
            println!("{}", output);
            if !cli.no_pause {
                wait_for_acknowledgment();
            }
        }
        Err(err @ ToolError::RootOpen(_)) => {
            // A refused root means nothing further would be reachable, so
            // there is no report to show.
            eprintln!("Error: {}", err);
            process::exit(EXIT_ROOT_OPEN_FAILED);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Block until the user presses enter. The prompt goes to the terminal, not
/// stdout, so piped report output stays clean.
fn wait_for_acknowledgment() {
    let _ = dialoguer::Input::<String>::new()
        .with_prompt("Press Enter to exit")
        .allow_empty(true)
        .interact_text();
}
