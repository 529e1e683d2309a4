//! Records produced by the optimizer.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AttemptError;

/// One apply-then-validate attempt of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptOutcome {
    pass: String,
    iteration: u32,
    apply_succeeded: bool,
    validation_succeeded: bool,
    content_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<AttemptError>,
}

impl AttemptOutcome {
    pub(crate) fn new(pass: &str, iteration: u32) -> Self {
        Self {
            pass: pass.to_owned(),
            iteration,
            apply_succeeded: false,
            validation_succeeded: false,
            content_changed: false,
            error: None,
        }
    }

    pub(crate) const fn applied(mut self, content_changed: bool) -> Self {
        self.apply_succeeded = true;
        self.content_changed = content_changed;
        self
    }

    pub(crate) const fn validated(mut self) -> Self {
        self.validation_succeeded = true;
        self
    }

    pub(crate) fn failed(mut self, error: AttemptError) -> Self {
        self.error = Some(error);
        self
    }

    /// Pass name.
    #[must_use]
    pub fn pass(&self) -> &str {
        self.pass.as_str()
    }

    /// One-based attempt number within the pass.
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// The tool exited successfully.
    #[must_use]
    pub const fn apply_succeeded(&self) -> bool {
        self.apply_succeeded
    }

    /// Validation ran and passed.
    #[must_use]
    pub const fn validation_succeeded(&self) -> bool {
        self.validation_succeeded
    }

    /// The tool modified the file.
    #[must_use]
    pub const fn content_changed(&self) -> bool {
        self.content_changed
    }

    /// Why the attempt failed, if it did.
    #[must_use]
    pub const fn error(&self) -> Option<&AttemptError> {
        self.error.as_ref()
    }

    /// Returns true when both apply and validation succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.apply_succeeded && self.validation_succeeded
    }
}

/// Terminal state of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    /// Every pass ran to a decision and the file did not end reverted to
    /// its original content.
    Optimized,
    /// The file holds its original content after a rollback.
    RolledBack,
    /// A fatal error ended work on the file.
    Failed,
}

impl FinalState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Optimized => "optimized",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    path: PathBuf,
    attempts: Vec<AttemptOutcome>,
    final_state: FinalState,
    rollback_occurred: bool,
    aborted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fatal: Option<AttemptError>,
}

impl FileResult {
    pub(crate) const fn new(
        path: PathBuf,
        attempts: Vec<AttemptOutcome>,
        final_state: FinalState,
        rollback_occurred: bool,
        aborted: bool,
        fatal: Option<AttemptError>,
    ) -> Self {
        Self {
            path,
            attempts,
            final_state,
            rollback_occurred,
            aborted,
            fatal,
        }
    }

    /// Path as given to the scheduler.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Attempts in execution order.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptOutcome] {
        &self.attempts
    }

    /// Terminal state.
    #[must_use]
    pub const fn final_state(&self) -> FinalState {
        self.final_state
    }

    /// At least one pass was exhausted and its changes were reverted.
    #[must_use]
    pub const fn rollback_occurred(&self) -> bool {
        self.rollback_occurred
    }

    /// Remaining passes were skipped after an unresolved failure or a fatal
    /// error.
    #[must_use]
    pub const fn aborted(&self) -> bool {
        self.aborted
    }

    /// Error that ended work on the file.
    #[must_use]
    pub const fn fatal(&self) -> Option<&AttemptError> {
        self.fatal.as_ref()
    }

    /// Attempts made for `pass`.
    pub fn attempts_for<'a>(&'a self, pass: &'a str) -> impl Iterator<Item = &'a AttemptOutcome> {
        self.attempts.iter().filter(move |attempt| attempt.pass == pass)
    }

    /// Returns true when some attempt of `pass` succeeded.
    #[must_use]
    pub fn pass_succeeded(&self, pass: &str) -> bool {
        self.attempts_for(pass).any(AttemptOutcome::succeeded)
    }
}
