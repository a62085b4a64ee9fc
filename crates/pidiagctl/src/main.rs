//! pidiagctl - command-line front end for the Pi-Apps log diagnosis engine

use clap::Parser;
use pidiagctl::cli::Cli;
use pidiagctl::commands;
use pidiagctl::errors::{error_code, exit_code_for};
use pidiagctl::logging::{ErrorDetails, LogEntry};
use pidiagctl::output::display_error;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        std::env::var("PIDIAG_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let start = Instant::now();
    let (command, args) = cli.command.describe();

    let (exit_code, category, error) = match commands::execute(cli) {
        Ok(outcome) => (outcome.exit_code, outcome.category, None),
        Err(e) => {
            display_error(&format!("{:#}", e));
            let details = ErrorDetails {
                code: error_code(&e),
                message: format!("{:#}", e),
            };
            (exit_code_for(&e), None, Some(details))
        }
    };

    LogEntry {
        ts: LogEntry::now(),
        req_id: LogEntry::generate_req_id(),
        command: command.to_string(),
        args,
        exit_code,
        duration_ms: start.elapsed().as_millis() as u64,
        category,
        ok: error.is_none(),
        error,
    }
    .write();

    std::process::exit(exit_code);
}
