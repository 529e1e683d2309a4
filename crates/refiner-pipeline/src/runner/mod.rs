//! Applies one pass to one file.
//!
//! [`PassRunner`] renders a pass's command template for the file, runs it in
//! the workspace through a [`CommandExecutor`], and folds the result into a
//! [`PassOutcome`]. Failures are reported as data; nothing here aborts the
//! run.

use std::path::Path;
use std::time::Duration;

use refiner_config::PassDefinition;

use crate::error::{AttemptError, DIAGNOSTIC_TAIL_CHARS, ErrorKind, diagnostic_tail};
use crate::executor::{CommandExecutor, Invocation, Stage};

/// Result of applying a pass once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    ok: bool,
    output: String,
    error: Option<AttemptError>,
}

impl PassOutcome {
    /// The tool exited successfully.
    #[must_use]
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
            error: None,
        }
    }

    /// The tool failed or could not be started.
    #[must_use]
    pub fn failed(output: impl Into<String>, error: AttemptError) -> Self {
        Self {
            ok: false,
            output: output.into(),
            error: Some(error),
        }
    }

    /// Returns true when the tool exited with status zero.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.ok
    }

    /// Captured stdout and stderr.
    #[must_use]
    pub fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Failure record, present whenever [`Self::is_ok`] is false.
    #[must_use]
    pub const fn error(&self) -> Option<&AttemptError> {
        self.error.as_ref()
    }

    /// Consumes the outcome, returning the failure record.
    #[must_use]
    pub fn into_error(self) -> Option<AttemptError> {
        self.error
    }

    /// Converts the outcome into the captured output or the failure record.
    ///
    /// # Errors
    ///
    /// Returns the [`AttemptError`] of a failed run.
    pub fn into_result(self) -> Result<String, AttemptError> {
        self.error.map_or(Ok(self.output), Err)
    }
}

/// Runs pass commands against files in a workspace.
#[derive(Debug)]
pub struct PassRunner<'a, E: ?Sized> {
    executor: &'a E,
    workspace: &'a Path,
    default_timeout: Option<Duration>,
}

impl<'a, E> PassRunner<'a, E>
where
    E: CommandExecutor + ?Sized,
{
    /// Creates a runner. `default_timeout` applies to passes without their
    /// own override.
    #[must_use]
    pub const fn new(executor: &'a E, workspace: &'a Path, default_timeout: Option<Duration>) -> Self {
        Self {
            executor,
            workspace,
            default_timeout,
        }
    }

    /// Applies `pass` to `file`, which must already be resolved against the
    /// workspace.
    #[must_use]
    pub fn run(&self, pass: &PassDefinition, file: &Path) -> PassOutcome {
        let timeout = pass.timeout().or(self.default_timeout);
        let argv = pass.command().render(file, self.workspace);
        let invocation = Invocation::new(Stage::Apply, pass.name(), file, argv)
            .in_dir(self.workspace)
            .with_timeout(timeout);

        match self.executor.execute(&invocation) {
            Ok(output) if output.success() => PassOutcome::succeeded(output.combined()),
            Ok(output) => {
                let combined = output.combined();
                let mut message = format!("pass '{}' {}", pass.name(), output.describe_exit(timeout));
                let tail = diagnostic_tail(&combined, DIAGNOSTIC_TAIL_CHARS);
                if !tail.is_empty() {
                    message.push_str(": ");
                    message.push_str(tail);
                }
                PassOutcome::failed(combined, AttemptError::new(ErrorKind::ToolFailure, message))
            }
            Err(error) => {
                let kind = if error.is_start_failure() {
                    ErrorKind::ToolInvocation
                } else {
                    ErrorKind::ToolFailure
                };
                let message = format!("pass '{}': {error}", pass.name());
                PassOutcome::failed(String::new(), AttemptError::new(kind, message))
            }
        }
    }
}

#[cfg(test)]
mod tests;
