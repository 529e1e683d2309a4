//! Bounded worker pool fanning files out to optimizers.
//!
//! Files are handed to `concurrency` scoped worker threads through a
//! rendezvous channel, so a file is only taken once a worker is free to
//! start it. Results come back over a second channel in completion order.
//!
//! Soft-stop: when a finished file calls for it (an unresolved failure
//! while failures are not ignored, or any rollback error) the worker raises
//! a shared flag before asking for more work. The dispatcher checks the flag
//! before every hand-off and workers check it again on receipt, so no file
//! starts after the flag is up while in-flight files still run to
//! completion.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread;

use refiner_config::{Config, PipelineDefinition};
use serde::Serialize;
use tracing::debug;

use crate::error::ErrorKind;
use crate::executor::CommandExecutor;
use crate::observer::RunObserver;
use crate::optimizer::{FileOptimizer, FileResult, FinalState, OptimizerOptions};

const SCHEDULER_TARGET: &str = "refiner_pipeline::scheduler";

/// Pool size plus the per-file policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    concurrency: usize,
    optimizer: OptimizerOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(refiner_config::DEFAULT_CONCURRENCY)
    }
}

impl RunOptions {
    /// Creates options for a pool of `concurrency` workers. Zero is raised
    /// to one.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            optimizer: OptimizerOptions::default(),
        }
    }

    /// Derives run options from resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let optimizer = OptimizerOptions::new(config.max_iterations)
            .with_ignore_failure(config.ignore_failure)
            .with_rollback_scope(config.rollback_scope)
            .with_timeout(config.timeout());
        Self::new(config.concurrency).with_optimizer(optimizer)
    }

    /// Replaces the per-file policy.
    #[must_use]
    pub const fn with_optimizer(mut self, optimizer: OptimizerOptions) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Number of workers.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Per-file policy.
    #[must_use]
    pub const fn optimizer(&self) -> OptimizerOptions {
        self.optimizer
    }
}

/// How the run as a whole ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every file was processed.
    Completed,
    /// A soft-stop left some files unstarted or ended on a fatal rollback.
    AbortedOnFailure,
}

impl OverallStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AbortedOnFailure => "aborted_on_failure",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    results: Vec<FileResult>,
    skipped: Vec<PathBuf>,
    overall_status: OverallStatus,
}

impl RunSummary {
    /// File results in completion order.
    #[must_use]
    pub fn results(&self) -> &[FileResult] {
        &self.results
    }

    /// Looks a result up by the path it was scheduled under.
    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&FileResult> {
        let path = path.as_ref();
        self.results.iter().find(|result| result.path() == path)
    }

    /// Files never started because of a soft-stop, in input order.
    #[must_use]
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// Overall status.
    #[must_use]
    pub const fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    /// Returns true when the run completed and no file failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.overall_status == OverallStatus::Completed
            && self
                .results
                .iter()
                .all(|result| result.final_state() != FinalState::Failed)
    }
}

enum WorkerReport {
    Finished(FileResult),
    Skipped(usize, PathBuf),
}

/// Runs a pipeline over many files.
pub struct Scheduler<'a, E: ?Sized> {
    pipeline: &'a PipelineDefinition,
    executor: &'a E,
    workspace: &'a Path,
    options: RunOptions,
    observer: &'a dyn RunObserver,
}

impl<'a, E> Scheduler<'a, E>
where
    E: CommandExecutor + ?Sized,
{
    /// Creates a scheduler for files under `workspace`.
    #[must_use]
    pub fn new(
        pipeline: &'a PipelineDefinition,
        executor: &'a E,
        workspace: &'a Path,
        options: RunOptions,
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

    /// Optimizes every file, at most `concurrency` at a time. Paths naming
    /// the same file under the workspace are processed once, reported under
    /// the first spelling given.
    #[must_use]
    pub fn run<P: AsRef<Path>>(&self, files: &[P]) -> RunSummary {
        let files = unique_paths(self.workspace, files);
        let stop = AtomicBool::new(false);
        let workers = self.options.concurrency().min(files.len()).max(1);
        let (job_tx, job_rx) = mpsc::sync_channel::<(usize, PathBuf)>(0);
        let job_rx = Mutex::new(job_rx);
        let (report_tx, report_rx) = mpsc::channel();
        let mut skipped = Vec::new();

        debug!(
            target: SCHEDULER_TARGET,
            files = files.len(),
            workers,
            "starting run"
        );

        thread::scope(|scope| {
            for _ in 0..workers {
                let reports = report_tx.clone();
                let jobs = &job_rx;
                let stop = &stop;
                scope.spawn(move || self.work(jobs, &reports, stop));
            }

            for (index, path) in files.into_iter().enumerate() {
                if stop.load(Ordering::SeqCst) {
                    self.observer.file_skipped(&path);
                    skipped.push((index, path));
                    continue;
                }
                if let Err(mpsc::SendError((index, path))) = job_tx.send((index, path)) {
                    skipped.push((index, path));
                }
            }
            drop(job_tx);
        });
        drop(report_tx);

        let mut results = Vec::new();
        for report in report_rx {
            match report {
                WorkerReport::Finished(result) => results.push(result),
                WorkerReport::Skipped(index, path) => skipped.push((index, path)),
            }
        }
        skipped.sort_by_key(|(index, _)| *index);

        let overall_status = if stop.load(Ordering::SeqCst) {
            OverallStatus::AbortedOnFailure
        } else {
            OverallStatus::Completed
        };
        RunSummary {
            results,
            skipped: skipped.into_iter().map(|(_, path)| path).collect(),
            overall_status,
        }
    }

    fn work(
        &self,
        jobs: &Mutex<Receiver<(usize, PathBuf)>>,
        reports: &Sender<WorkerReport>,
        stop: &AtomicBool,
    ) {
        let optimizer = FileOptimizer::new(
            self.pipeline,
            self.executor,
            self.workspace,
            self.options.optimizer(),
            self.observer,
        );
        loop {
            let job = jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .recv();
            let Ok((index, path)) = job else {
                break;
            };

            let report = if stop.load(Ordering::SeqCst) {
                self.observer.file_skipped(&path);
                WorkerReport::Skipped(index, path)
            } else {
                let result = optimizer.optimize(&path);
                if self.calls_for_stop(&result) && !stop.swap(true, Ordering::SeqCst) {
                    self.observer.soft_stop(result.path(), result.fatal());
                }
                WorkerReport::Finished(result)
            };
            if reports.send(report).is_err() {
                break;
            }
        }
    }

    fn calls_for_stop(&self, result: &FileResult) -> bool {
        let unresolved = result.aborted() && !self.options.optimizer().ignore_failure();
        let rollback_failed = result
            .fatal()
            .is_some_and(|error| error.kind() == ErrorKind::Rollback);
        unresolved || rollback_failed
    }
}

fn unique_paths<P: AsRef<Path>>(workspace: &Path, files: &[P]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    files
        .iter()
        .map(|file| file.as_ref().to_path_buf())
        .filter(|path| seen.insert(file_key(workspace, path)))
        .collect()
}

/// Identity of a file under `workspace`: the resolved path when it exists,
/// otherwise the lexically normalised one.
fn file_key(workspace: &Path, path: &Path) -> PathBuf {
    let normal = normalize(&workspace.join(path));
    fs::canonicalize(&normal).unwrap_or(normal)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(normal.components().next_back(), Some(Component::Normal(_))) =>
            {
                normal.pop();
            }
            other => normal.push(other),
        }
    }
    normal
}

#[cfg(test)]
mod tests;
