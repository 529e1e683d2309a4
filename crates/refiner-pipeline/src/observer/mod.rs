//! Run lifecycle hooks.
//!
//! The optimizer and scheduler report progress through a [`RunObserver`]
//! passed in for the duration of one run instead of writing to a global
//! logger. [`TracingObserver`] forwards every hook to `tracing`;
//! [`NoopObserver`] discards them.

use std::path::Path;

use refiner_config::RollbackScope;
use tracing::{debug, info, warn};

use crate::error::AttemptError;
use crate::optimizer::{AttemptOutcome, FileResult};

const OPTIMIZER_TARGET: &str = "refiner_pipeline::optimizer";
const SCHEDULER_TARGET: &str = "refiner_pipeline::scheduler";

/// Receives lifecycle events from a run. Every hook defaults to doing
/// nothing.
pub trait RunObserver: Send + Sync {
    /// A worker started optimizing `path`.
    fn file_started(&self, path: &Path) {
        let _ = path;
    }

    /// One apply-then-validate attempt finished.
    fn attempt_finished(&self, path: &Path, attempt: &AttemptOutcome) {
        let _ = (path, attempt);
    }

    /// `pass` exhausted its iterations and the file was restored.
    fn rolled_back(&self, path: &Path, pass: &str, scope: RollbackScope) {
        let _ = (path, pass, scope);
    }

    /// The file reached its final state.
    fn file_finished(&self, result: &FileResult) {
        let _ = result;
    }

    /// The outcome of `path` stopped further dispatch.
    fn soft_stop(&self, path: &Path, reason: Option<&AttemptError>) {
        let _ = (path, reason);
    }

    /// `path` was never started because the run was stopping.
    fn file_skipped(&self, path: &Path) {
        let _ = path;
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Emits every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn file_started(&self, path: &Path) {
        debug!(target: OPTIMIZER_TARGET, file = %path.display(), "optimizing file");
    }

    fn attempt_finished(&self, path: &Path, attempt: &AttemptOutcome) {
        match attempt.error() {
            None => debug!(
                target: OPTIMIZER_TARGET,
                file = %path.display(),
                pass = attempt.pass(),
                iteration = attempt.iteration(),
                changed = attempt.content_changed(),
                "pass validated"
            ),
            Some(error) => info!(
                target: OPTIMIZER_TARGET,
                file = %path.display(),
                pass = attempt.pass(),
                iteration = attempt.iteration(),
                kind = %error.kind(),
                error = error.message(),
                "attempt failed"
            ),
        }
    }

    fn rolled_back(&self, path: &Path, pass: &str, scope: RollbackScope) {
        warn!(
            target: OPTIMIZER_TARGET,
            file = %path.display(),
            pass,
            scope = %scope,
            "pass exhausted its iterations, content restored"
        );
    }

    fn file_finished(&self, result: &FileResult) {
        info!(
            target: OPTIMIZER_TARGET,
            file = %result.path().display(),
            state = %result.final_state(),
            attempts = result.attempts().len(),
            rollback = result.rollback_occurred(),
            "file finished"
        );
    }

    fn soft_stop(&self, path: &Path, reason: Option<&AttemptError>) {
        warn!(
            target: SCHEDULER_TARGET,
            file = %path.display(),
            reason = %reason.map_or_else(|| String::from("unresolved failure"), ToString::to_string),
            "stopping dispatch of remaining files"
        );
    }

    fn file_skipped(&self, path: &Path) {
        debug!(target: SCHEDULER_TARGET, file = %path.display(), "file skipped");
    }
}
