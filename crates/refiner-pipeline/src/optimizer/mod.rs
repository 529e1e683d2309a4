//! Per-file retry and rollback state machine.
//!
//! [`FileOptimizer`] walks one file through every pass of a pipeline. Each
//! pass gets up to `max_iterations` apply-then-validate attempts; retries run
//! against whatever the previous attempt left on disk. A pass that exhausts
//! its attempts has its changes reverted according to the rollback scope
//! before the optimizer moves on (or stops, when failures are not ignored).
//!
//! Tool invocation and configuration errors end work on the file at once. A
//! file that cannot be read at all fails as a configuration error.
//! Any unvalidated change still on disk is reverted before the file is
//! reported as [`FinalState::Failed`], so a file is never left holding a
//! change that failed validation.

mod outcome;
mod task;

use std::path::Path;
use std::time::Duration;

use refiner_config::{PassDefinition, PipelineDefinition, RollbackScope};

use crate::error::{AttemptError, ErrorKind, RestoreError};
use crate::executor::CommandExecutor;
use crate::observer::RunObserver;
use crate::runner::PassRunner;
use crate::validator::Validator;

pub use self::outcome::{AttemptOutcome, FileResult, FinalState};
pub use self::task::FileTask;

/// Retry and rollback policy for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerOptions {
    max_iterations: u32,
    ignore_failure: bool,
    rollback_scope: RollbackScope,
    timeout: Option<Duration>,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self::new(refiner_config::DEFAULT_MAX_ITERATIONS)
    }
}

impl OptimizerOptions {
    /// Creates options allowing `max_iterations` attempts per pass. Zero is
    /// raised to one.
    #[must_use]
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            ignore_failure: false,
            rollback_scope: RollbackScope::default(),
            timeout: None,
        }
    }

    /// Continue with later passes after a pass exhausts its attempts.
    #[must_use]
    pub const fn with_ignore_failure(mut self, ignore_failure: bool) -> Self {
        self.ignore_failure = ignore_failure;
        self
    }

    /// Chooses what a rollback restores.
    #[must_use]
    pub const fn with_rollback_scope(mut self, scope: RollbackScope) -> Self {
        self.rollback_scope = scope;
        self
    }

    /// Default per-invocation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attempts allowed per pass.
    #[must_use]
    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Whether later passes run after an exhausted one.
    #[must_use]
    pub const fn ignore_failure(&self) -> bool {
        self.ignore_failure
    }

    /// Rollback scope.
    #[must_use]
    pub const fn rollback_scope(&self) -> RollbackScope {
        self.rollback_scope
    }

    /// Default per-invocation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

enum PassResult {
    Validated,
    Exhausted,
    Fatal(AttemptError),
}

/// Mutable bookkeeping for one file.
#[derive(Default)]
struct Progress {
    attempts: Vec<AttemptOutcome>,
    rollback_occurred: bool,
    ends_on_original: bool,
    aborted: bool,
    fatal: Option<AttemptError>,
}

/// Drives one file through the pipeline.
pub struct FileOptimizer<'a, E: ?Sized> {
    pipeline: &'a PipelineDefinition,
    executor: &'a E,
    workspace: &'a Path,
    options: OptimizerOptions,
    observer: &'a dyn RunObserver,
}

impl<'a, E> FileOptimizer<'a, E>
where
    E: CommandExecutor + ?Sized,
{
    /// Creates an optimizer for files under `workspace`.
    #[must_use]
    pub fn new(
        pipeline: &'a PipelineDefinition,
        executor: &'a E,
        workspace: &'a Path,
        options: OptimizerOptions,
        observer: &'a dyn RunObserver,
    ) -> Self {
        Self {
            pipeline,
            executor,
            workspace,
            options,
            observer,
        }
    }

    /// Runs every pass against `path`, resolved relative to the workspace,
    /// and reports what happened.
    #[must_use]
    pub fn optimize(&self, path: &Path) -> FileResult {
        self.observer.file_started(path);
        let mut progress = Progress::default();

        match FileTask::capture(self.workspace.join(path)) {
            Ok(mut task) => self.run_passes(path, &mut task, &mut progress),
            Err(error) => {
                progress.aborted = true;
                let unreadable = AttemptError::new(ErrorKind::Configuration, error.to_string());
                progress.fatal = Some(unreadable);
            }
        }

        let final_state = if progress.fatal.is_some() {
            FinalState::Failed
        } else if progress.ends_on_original {
            FinalState::RolledBack
        } else {
            FinalState::Optimized
        };
        let result = FileResult::new(
            path.to_path_buf(),
            progress.attempts,
            final_state,
            progress.rollback_occurred,
            progress.aborted,
            progress.fatal,
        );
        self.observer.file_finished(&result);
        result
    }

    fn run_passes(&self, path: &Path, task: &mut FileTask, progress: &mut Progress) {
        let runner = PassRunner::new(self.executor, self.workspace, self.options.timeout());
        let validator = Validator::new(
            self.executor,
            self.workspace,
            self.pipeline.validation_command(),
            self.options.timeout(),
        );
        let scope = self.options.rollback_scope();

        for pass in self.pipeline.passes() {
            match self.run_pass(path, task, pass, &runner, &validator, progress) {
                PassResult::Validated => progress.ends_on_original = false,
                PassResult::Exhausted => {
                    if let Err(error) = self.roll_back(path, task, pass.name(), progress) {
                        progress.aborted = true;
                        progress.fatal = Some(error.into());
                        return;
                    }
                    progress.ends_on_original = task.rollback_target(scope) == task.original();
                    if !self.options.ignore_failure() {
                        progress.aborted = true;
                        return;
                    }
                }
                PassResult::Fatal(error) => {
                    let restored = self.discard_unvalidated(path, task, pass.name(), progress);
                    progress.aborted = true;
                    progress.fatal = Some(restored.map_or_else(AttemptError::from, |()| error));
                    return;
                }
            }
        }
    }

    fn run_pass(
        &self,
        path: &Path,
        task: &mut FileTask,
        pass: &PassDefinition,
        runner: &PassRunner<'_, E>,
        validator: &Validator<'_, E>,
        progress: &mut Progress,
    ) -> PassResult {
        for iteration in 1..=self.options.max_iterations() {
            let attempt = AttemptOutcome::new(pass.name(), iteration);
            let before = task.current().ok();

            if let Err(error) = runner.run(pass, task.path()).into_result() {
                let fatal = error.kind().is_fatal();
                self.record(path, attempt.failed(error.clone()), progress);
                if fatal {
                    return PassResult::Fatal(error);
                }
                continue;
            }

            let attempt = attempt.applied(task.current().ok() != before);
            match validator.validate(task.path(), pass.name()).into_result() {
                Ok(_) => {
                    self.record(path, attempt.validated(), progress);
                    return match task.take_checkpoint() {
                        Ok(()) => PassResult::Validated,
                        Err(error) => PassResult::Fatal(error.into()),
                    };
                }
                Err(error) => {
                    let fatal = error.kind().is_fatal();
                    self.record(path, attempt.failed(error.clone()), progress);
                    if fatal {
                        return PassResult::Fatal(error);
                    }
                }
            }
        }
        PassResult::Exhausted
    }

    fn record(&self, path: &Path, attempt: AttemptOutcome, progress: &mut Progress) {
        self.observer.attempt_finished(path, &attempt);
        progress.attempts.push(attempt);
    }

    fn roll_back(
        &self,
        path: &Path,
        task: &FileTask,
        pass: &str,
        progress: &mut Progress,
    ) -> Result<(), RestoreError> {
        let scope = self.options.rollback_scope();
        task.restore(scope)?;
        progress.rollback_occurred = true;
        self.observer.rolled_back(path, pass, scope);
        Ok(())
    }

    /// Reverts the file when it no longer holds the last validated content.
    fn discard_unvalidated(
        &self,
        path: &Path,
        task: &FileTask,
        pass: &str,
        progress: &mut Progress,
    ) -> Result<(), RestoreError> {
        let current = task.current().ok();
        if current.as_deref() == Some(task.checkpoint()) {
            return Ok(());
        }
        self.roll_back(path, task, pass, progress)
    }
}
