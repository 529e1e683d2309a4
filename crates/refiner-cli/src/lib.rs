//! Command-line interface runtime for the refiner pipeline.
//!
//! The runtime owns argument parsing, configuration bootstrapping, telemetry
//! installation and result rendering. The pipeline itself lives in
//! `refiner_pipeline`; this crate wires it to real processes and the
//! terminal. Configuration loading and IO streams can be substituted so the
//! whole flow is exercised from tests.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use refiner_config::{Config, PipelineDefinition};
use refiner_pipeline::{ProcessExecutor, RunOptions, RunSummary, Scheduler, TracingObserver};
use tracing::info;

mod cli;
mod config;
mod errors;
pub mod output;
mod telemetry;


use cli::Cli;
use config::{command_arguments, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
pub use output::{OutputFormat, ResolvedOutputFormat};

const CLI_TARGET: &str = "refiner_cli";

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, R: BufRead, W: Write, E: Write> {
    pub(crate) stdin: &'a mut R,
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdout_is_terminal: bool,
}

impl<'a, R: BufRead, W: Write, E: Write> IoStreams<'a, R, W, E> {
    pub(crate) const fn new(
        stdin: &'a mut R,
        stdout: &'a mut W,
        stderr: &'a mut E,
        stdout_is_terminal: bool,
    ) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
            stdout_is_terminal,
        }
    }
}

struct CliRunner<'a, 'io, R: BufRead, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'io, R, W, E>,
    loader: &'a L,
}

impl<'a, 'io, R, W, E, L> CliRunner<'a, 'io, R, W, E, L>
where
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'io, R, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        match self.execute(args) {
            Ok(exit_code) => exit_code,
            Err(AppError::CliUsage(error)) if !error.use_stderr() => {
                let _ = write!(self.io.stdout, "{}", error.render());
                ExitCode::SUCCESS
            }
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }

    fn execute<I>(&mut self, args: I) -> Result<ExitCode, AppError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli = Cli::try_parse_from(command_arguments(&args, &split))
            .map_err(AppError::CliUsage)?;
        let config = self.loader.load(&split.config_arguments)?;
        telemetry::initialise(&config)?;

        if !cli.workspace.is_dir() {
            return Err(AppError::MissingWorkspace {
                path: cli.workspace,
            });
        }
        let pipeline = load_pipeline(&config, &cli.workspace)?;
        let files = if cli.files.is_empty() {
            read_file_list(&mut *self.io.stdin)?
        } else {
            cli.files
        };

        info!(
            target: CLI_TARGET,
            workspace = %cli.workspace.display(),
            files = files.len(),
            passes = pipeline.passes().len(),
            concurrency = config.concurrency,
            "starting run"
        );
        let summary = run_pipeline(&pipeline, &config, &cli.workspace, &files);
        info!(
            target: CLI_TARGET,
            status = %summary.overall_status(),
            "run finished"
        );

        let format = cli.output.resolve(self.io.stdout_is_terminal);
        output::render(&summary, format, &mut *self.io.stdout)?;
        Ok(exit_code(&summary))
    }
}

/// Loads the pipeline definition, resolving a relative path against the
/// workspace root.
fn load_pipeline(config: &Config, workspace: &Path) -> Result<PipelineDefinition, AppError> {
    let configured = config.pipeline_path().as_std_path();
    let path = if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        workspace.join(configured)
    };
    PipelineDefinition::load(path).map_err(AppError::LoadPipeline)
}

/// Reads one path per line, ignoring blank lines and surrounding whitespace.
fn read_file_list<R: BufRead>(stdin: &mut R) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for line in stdin.lines() {
        let line = line.map_err(AppError::ReadInput)?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            files.push(PathBuf::from(trimmed));
        }
    }
    Ok(files)
}

fn run_pipeline(
    pipeline: &PipelineDefinition,
    config: &Config,
    workspace: &Path,
    files: &[PathBuf],
) -> RunSummary {
    let executor = ProcessExecutor::new();
    Scheduler::new(
        pipeline,
        &executor,
        workspace,
        RunOptions::from_config(config),
        &TracingObserver,
    )
    .run(files)
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, R, W, E, L>(
    args: I,
    io: &mut IoStreams<'_, R, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

/// Runs the CLI using the provided arguments and IO handles.
///
/// Returns success only when every file finished without a fatal error and
/// the run was not stopped early.
#[must_use]
pub fn run<I, R, W, E>(
    args: I,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
    stdout_is_terminal: bool,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdin, stdout, stderr, stdout_is_terminal);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}
