//! CLI argument definitions for the refiner binary.

use std::path::PathBuf;

use clap::Parser;

use crate::output::OutputFormat;

/// Applies a validated pipeline of external tools to workspace files.
///
/// Configuration flags (`--concurrency`, `--max-iterations`, and the rest)
/// must come before these arguments.
#[derive(Parser, Debug)]
#[command(name = "refiner", version)]
pub(crate) struct Cli {
    /// Workspace root; relative file paths resolve against it.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub(crate) workspace: PathBuf,
    /// Controls how the run summary is rendered.
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto)]
    pub(crate) output: OutputFormat,
    /// Files to optimize. Read one per line from stdin when omitted.
    #[arg(value_name = "FILE")]
    pub(crate) files: Vec<PathBuf>,
}
