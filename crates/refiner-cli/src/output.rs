//! Rendering of run results on stdout.

use std::io::Write;

use clap::ValueEnum;
use refiner_pipeline::{FileResult, FinalState, RunReport, RunSummary};
use serde::Serialize;

use crate::AppError;

/// Output format selection for the run summary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Selects `human` for terminal output and `json` for redirected output.
    #[default]
    Auto,
    /// Always render a human-readable table.
    Human,
    /// Always emit the summary and report as JSON.
    Json,
}

/// Output format after resolving `auto` based on TTY detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolvedOutputFormat {
    /// Human-readable table.
    Human,
    /// JSON document.
    Json,
}

impl OutputFormat {
    /// Resolves the output format based on whether stdout is a terminal.
    #[must_use]
    pub const fn resolve(self, stdout_is_terminal: bool) -> ResolvedOutputFormat {
        match self {
            Self::Auto if stdout_is_terminal => ResolvedOutputFormat::Human,
            Self::Auto | Self::Json => ResolvedOutputFormat::Json,
            Self::Human => ResolvedOutputFormat::Human,
        }
    }
}

#[derive(Serialize)]
struct RunDocument<'a> {
    summary: &'a RunSummary,
    report: &'a RunReport,
}

/// Writes the summary and its report in the requested format.
pub(crate) fn render<W: Write>(
    summary: &RunSummary,
    format: ResolvedOutputFormat,
    stdout: &mut W,
) -> Result<(), AppError> {
    let report = RunReport::from_summary(summary);
    match format {
        ResolvedOutputFormat::Json => {
            let document = RunDocument {
                summary,
                report: &report,
            };
            serde_json::to_writer_pretty(&mut *stdout, &document)
                .map_err(AppError::SerialiseOutput)?;
            stdout.write_all(b"\n").map_err(AppError::WriteOutput)?;
        }
        ResolvedOutputFormat::Human => render_human(summary, &report, stdout)?,
    }
    stdout.flush().map_err(AppError::WriteOutput)
}

fn render_human<W: Write>(
    summary: &RunSummary,
    report: &RunReport,
    stdout: &mut W,
) -> Result<(), AppError> {
    let mut results: Vec<&FileResult> = summary.results().iter().collect();
    results.sort_by(|left, right| left.path().cmp(right.path()));

    for result in results {
        writeln!(
            stdout,
            "{:<12} {}{}",
            result.final_state().as_str(),
            result.path().display(),
            file_note(result)
        )
        .map_err(AppError::WriteOutput)?;
    }
    for path in summary.skipped() {
        writeln!(stdout, "{:<12} {}", "skipped", path.display()).map_err(AppError::WriteOutput)?;
    }

    writeln!(
        stdout,
        "\n{} optimized, {} rolled back, {} failed, {} skipped ({} attempts); run {}",
        report.optimized(),
        report.rolled_back(),
        report.failed(),
        report.skipped(),
        report.attempts(),
        report.overall_status(),
    )
    .map_err(AppError::WriteOutput)?;

    for pass in report.passes() {
        writeln!(
            stdout,
            "  {}: {}/{} files validated, {} attempts",
            pass.name(),
            pass.files_succeeded(),
            pass.files_attempted(),
            pass.attempts()
        )
        .map_err(AppError::WriteOutput)?;
    }
    if let Some(rate) = report.pass_success_rate() {
        writeln!(stdout, "  pass success rate: {rate:.2}").map_err(AppError::WriteOutput)?;
    }
    Ok(())
}

fn file_note(result: &FileResult) -> String {
    if let Some(fatal) = result.fatal() {
        return format!("  ({fatal})");
    }
    if result.final_state() == FinalState::RolledBack {
        let failed = result
            .attempts()
            .iter()
            .rev()
            .find_map(|attempt| attempt.error());
        if let Some(error) = failed {
            return format!("  ({error})");
        }
    }
    String::new()
}
