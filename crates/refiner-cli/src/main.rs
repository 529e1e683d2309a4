//! CLI entrypoint for the refiner pipeline.
//!
//! The binary delegates to [`refiner_cli::run`], which loads configuration,
//! reads the candidate file list, runs the pipeline over the workspace and
//! writes the run summary to stdout.

use std::io::{self, IsTerminal, Stderr, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdout_is_terminal = io::stdout().is_terminal();
    let mut stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    // Left unlocked: worker threads log to stderr while the run is in flight.
    let mut stderr: Stderr = io::stderr();
    refiner_cli::run(
        std::env::args_os(),
        &mut stdin,
        &mut stdout,
        &mut stderr,
        stdout_is_terminal,
    )
}
