//! Provrun: provider-execution orchestrator.
//!
//! This is the main entry point for the `provrun` CLI. It parses arguments,
//! sets up logging, dispatches to the appropriate command handler, and
//! handles errors with proper exit codes.

mod cli;
mod commands;
pub mod context;
pub mod coordinator;
pub mod declaration;
pub mod error;
pub mod events;
pub mod executor;
pub mod exit_codes;
pub mod fs;
pub mod install;
pub mod logging;
pub mod materialize;
pub mod merge;
pub mod pipeline;
pub mod process;
pub mod provision;
pub mod runtime;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(err) = logging::init_logging(&cli.log_format) {
        eprintln!("Error: {:#}", err);
        return ExitCode::from(exit_codes::USER_ERROR as u8);
    }

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            ExitCode::from(err.exit_code() as u8)
        }
    }
}
