//! Runs the validation command after a pass has changed a file.
//!
//! A genuine test failure is a retryable [`ErrorKind::ValidationFailure`].
//! A validation command that cannot even be started points at a broken
//! pipeline definition, so it is recorded as [`ErrorKind::Configuration`] and
//! logged apart from test failures.

use std::path::Path;
use std::time::Duration;

use refiner_config::CommandTemplate;
use tracing::error;

use crate::error::{AttemptError, DIAGNOSTIC_TAIL_CHARS, ErrorKind, diagnostic_tail};
use crate::executor::{CommandExecutor, Invocation, Stage};

const VALIDATOR_TARGET: &str = "refiner_pipeline::validator";

/// Result of one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    ok: bool,
    output: String,
    error: Option<AttemptError>,
}

impl ValidationOutcome {
    /// Returns true when the validation command exited with status zero.
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

/// Runs the configured validation command in the workspace.
#[derive(Debug)]
pub struct Validator<'a, E: ?Sized> {
    executor: &'a E,
    workspace: &'a Path,
    command: &'a CommandTemplate,
    timeout: Option<Duration>,
}

impl<'a, E> Validator<'a, E>
where
    E: CommandExecutor + ?Sized,
{
    /// Creates a validator for `command`.
    #[must_use]
    pub const fn new(
        executor: &'a E,
        workspace: &'a Path,
        command: &'a CommandTemplate,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            executor,
            workspace,
            command,
            timeout,
        }
    }

    /// Validates the workspace after `pass` changed `file`.
    #[must_use]
    pub fn validate(&self, file: &Path, pass: &str) -> ValidationOutcome {
        let argv = self.command.render(file, self.workspace);
        let invocation = Invocation::new(Stage::Validate, pass, file, argv)
            .in_dir(self.workspace)
            .with_timeout(self.timeout);

        match self.executor.execute(&invocation) {
            Ok(output) if output.success() => ValidationOutcome {
                ok: true,
                output: output.combined(),
                error: None,
            },
            Ok(output) => {
                let combined = output.combined();
                let mut message = format!(
                    "validation after '{pass}' {}",
                    output.describe_exit(self.timeout)
                );
                let tail = diagnostic_tail(&combined, DIAGNOSTIC_TAIL_CHARS);
                if !tail.is_empty() {
                    message.push_str(": ");
                    message.push_str(tail);
                }
                ValidationOutcome {
                    ok: false,
                    output: combined,
                    error: Some(AttemptError::new(ErrorKind::ValidationFailure, message)),
                }
            }
            Err(exec_error) if exec_error.is_start_failure() => {
                error!(
                    target: VALIDATOR_TARGET,
                    command = %self.command,
                    error = %exec_error,
                    "validation command is unusable"
                );
                ValidationOutcome {
                    ok: false,
                    output: String::new(),
                    error: Some(AttemptError::new(
                        ErrorKind::Configuration,
                        format!("validation command '{}': {exec_error}", self.command),
                    )),
                }
            }
            Err(exec_error) => ValidationOutcome {
                ok: false,
                output: String::new(),
                error: Some(AttemptError::new(
                    ErrorKind::ValidationFailure,
                    format!("validation after '{pass}': {exec_error}"),
                )),
            },
        }
    }
}
