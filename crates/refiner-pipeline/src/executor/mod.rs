//! The seam between the pipeline and the operating system.
//!
//! Both the pass runner and the validator describe what they want to run as
//! an [`Invocation`] and hand it to a [`CommandExecutor`]. The production
//! implementation is [`ProcessExecutor`], which spawns a child process and
//! enforces the invocation timeout. Tests substitute executors that return
//! scripted results without spawning anything.

mod process;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ExecError;

pub use self::process::ProcessExecutor;

/// Why a command is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Applying a pass to the file.
    Apply,
    /// Validating the workspace after a pass was applied.
    Validate,
}

impl Stage {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Validate => "validate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered command plus the context it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    stage: Stage,
    pass: String,
    file: PathBuf,
    argv: Vec<OsString>,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl Invocation {
    /// Creates an invocation of `argv` (program first) for `file`.
    #[must_use]
    pub fn new(
        stage: Stage,
        pass: impl Into<String>,
        file: impl Into<PathBuf>,
        argv: Vec<OsString>,
    ) -> Self {
        Self {
            stage,
            pass: pass.into(),
            file: file.into(),
            argv,
            working_dir: PathBuf::from("."),
            timeout: None,
        }
    }

    /// Sets the directory the command runs in.
    #[must_use]
    pub fn in_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Limits how long the command may run.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply or validate.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Pass being applied, or the pass whose change is being validated.
    #[must_use]
    pub fn pass(&self) -> &str {
        self.pass.as_str()
    }

    /// File the invocation concerns.
    #[must_use]
    pub fn file(&self) -> &Path {
        self.file.as_path()
    }

    /// Program followed by its arguments.
    #[must_use]
    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    /// Directory the command runs in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        self.working_dir.as_path()
    }

    /// Timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Program name for diagnostics.
    #[must_use]
    pub fn program(&self) -> String {
        self.argv
            .first()
            .map(|program| program.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Exit status and captured streams of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    status: Option<i32>,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

impl CommandOutput {
    /// Output of a command that exited with `code`.
    #[must_use]
    pub const fn exited(code: i32) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    /// Output of a command that was killed by a signal.
    #[must_use]
    pub const fn terminated() -> Self {
        Self {
            status: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    /// Output of a command that was killed after exceeding its timeout.
    #[must_use]
    pub const fn timed_out() -> Self {
        Self {
            status: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    /// Attaches captured streams.
    #[must_use]
    pub fn with_streams(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    /// Exit code, absent when the process was terminated by a signal.
    #[must_use]
    pub const fn status(&self) -> Option<i32> {
        self.status
    }

    /// Captured standard output.
    #[must_use]
    pub fn stdout(&self) -> &str {
        self.stdout.as_str()
    }

    /// Captured standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        self.stderr.as_str()
    }

    /// Returns true when the process was killed for running too long.
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Returns true only for a zero exit status.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0)) && !self.timed_out
    }

    /// Both streams joined, stderr last.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// One-line description of how the command ended.
    #[must_use]
    pub fn describe_exit(&self, timeout: Option<Duration>) -> String {
        if self.timed_out {
            return timeout.map_or_else(
                || String::from("timed out"),
                |limit| format!("timed out after {}s", limit.as_secs()),
            );
        }
        match self.status {
            Some(code) => format!("exited with status {code}"),
            None => String::from("terminated by signal"),
        }
    }
}

/// Runs external commands on behalf of the pipeline.
///
/// Implementations must be shareable across the worker pool.
pub trait CommandExecutor: Send + Sync {
    /// Runs the invocation to completion and returns its status and output.
    ///
    /// A non-zero exit or a timeout is reported through [`CommandOutput`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the command cannot be started or waited on.
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        (**self).execute(invocation)
    }
}
