//! Error kinds recorded against attempts and files.
//!
//! Failures inside the pipeline are data, not control flow: every attempt
//! stores an [`AttemptError`] naming its [`ErrorKind`] so that the run summary
//! can enumerate what happened to each file. The `thiserror` enums here cover
//! the operational failures that produce those records. I/O errors are wrapped
//! in `Arc` to keep the enums cheap to clone and `Send + Sync`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Longest diagnostic excerpt kept in an [`AttemptError`] message.
pub(crate) const DIAGNOSTIC_TAIL_CHARS: usize = 2_000;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The external tool could not be started at all.
    ToolInvocation,
    /// The tool ran and exited unsuccessfully, or timed out.
    ToolFailure,
    /// The validation command ran and reported failure, or timed out.
    ValidationFailure,
    /// The validation command, a pass definition or an input file is
    /// unusable.
    Configuration,
    /// Restoring or capturing file content failed.
    Rollback,
}

impl ErrorKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolInvocation => "tool_invocation",
            Self::ToolFailure => "tool_failure",
            Self::ValidationFailure => "validation_failure",
            Self::Configuration => "configuration",
            Self::Rollback => "rollback",
        }
    }

    /// Returns true when retrying the same attempt may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::ToolFailure | Self::ValidationFailure)
    }

    /// Returns true when the kind ends work on the file immediately,
    /// regardless of the failure policy.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !self.is_retryable()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded failure of one attempt, or the fatal error of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptError {
    kind: ErrorKind,
    message: String,
}

impl AttemptError {
    /// Builds an error record.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable description including captured diagnostics.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Errors raised by a [`CommandExecutor`](crate::executor::CommandExecutor).
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// The rendered command had no program.
    #[error("command for '{label}' is empty")]
    EmptyCommand {
        /// Pass name or validation label.
        label: String,
    },
    /// The program does not exist or is not on `PATH`.
    #[error("executable '{program}' not found")]
    NotFound {
        /// Program that was looked up.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// The program exists but could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// Waiting for or terminating the process failed.
    #[error("I/O error while running '{program}': {source}")]
    Io {
        /// Program being waited on.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl ExecError {
    /// Classifies a spawn failure, separating missing executables.
    #[must_use]
    pub fn spawn(program: impl Into<String>, error: std::io::Error) -> Self {
        let program = program.into();
        let source = Arc::new(error);
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { program, source }
        } else {
            Self::Spawn { program, source }
        }
    }

    /// Returns true when the process never started.
    #[must_use]
    pub const fn is_start_failure(&self) -> bool {
        matches!(
            self,
            Self::EmptyCommand { .. } | Self::NotFound { .. } | Self::Spawn { .. }
        )
    }
}

/// Failure to capture, checkpoint, or restore file content.
#[derive(Debug, Clone, Error)]
pub enum RestoreError {
    /// Reading the file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// Writing the restored content failed.
    #[error("failed to restore {path}: {source}")]
    Write {
        /// File being restored.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl RestoreError {
    /// Creates a read error.
    #[must_use]
    pub fn read(path: PathBuf, error: std::io::Error) -> Self {
        Self::Read {
            path,
            source: Arc::new(error),
        }
    }

    /// Creates a write error.
    #[must_use]
    pub fn write(path: PathBuf, error: std::io::Error) -> Self {
        Self::Write {
            path,
            source: Arc::new(error),
        }
    }
}

impl From<RestoreError> for AttemptError {
    fn from(error: RestoreError) -> Self {
        Self::new(ErrorKind::Rollback, error.to_string())
    }
}

/// Keeps the last `max_chars` characters of captured output.
pub(crate) fn diagnostic_tail(text: &str, max_chars: usize) -> &str {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed;
    }
    let skip = count - max_chars;
    trimmed
        .char_indices()
        .nth(skip)
        .and_then(|(offset, _)| trimmed.get(offset..))
        .unwrap_or(trimmed)
}
