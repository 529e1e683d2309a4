//! Validated, retryable, rollback-safe optimization of many files.
//!
//! The `refiner-pipeline` crate applies an ordered list of external tools
//! (passes) to each file in a workspace. Every change a pass makes is checked
//! by a validation command; failed attempts are retried up to a bound, and a
//! pass that never validates has its changes rolled back. Files are processed
//! concurrently by a bounded worker pool that can stop dispatching new files
//! after an unresolved failure.
//!
//! # Architecture
//!
//! Components, leaves first:
//!
//! - [`executor`]: the [`CommandExecutor`] seam through which every external
//!   command runs, with the process-backed [`ProcessExecutor`].
//! - [`runner`]: [`PassRunner`] applies one pass to one file.
//! - [`validator`]: [`Validator`] runs the validation command.
//! - [`optimizer`]: [`FileOptimizer`] drives the per-file retry and rollback
//!   state machine.
//! - [`scheduler`]: [`Scheduler`] fans files out to workers and enforces the
//!   failure policy.
//! - [`report`]: [`RunReport`] aggregates a [`RunSummary`].
//!
//! Progress is reported through an injected [`RunObserver`] rather than a
//! global logger.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//!
//! use refiner_config::PipelineDefinition;
//! use refiner_pipeline::{ProcessExecutor, RunOptions, RunReport, Scheduler, TracingObserver};
//!
//! let pipeline = PipelineDefinition::load("refiner.yaml").expect("pipeline");
//! let executor = ProcessExecutor::new();
//! let files = [PathBuf::from("src/app.py")];
//! let summary = Scheduler::new(
//!     &pipeline,
//!     &executor,
//!     Path::new("."),
//!     RunOptions::new(4),
//!     &TracingObserver,
//! )
//! .run(&files);
//! let report = RunReport::from_summary(&summary);
//! println!("{} optimized", report.optimized());
//! ```

pub mod error;
pub mod executor;
pub mod observer;
pub mod optimizer;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod validator;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use self::error::{AttemptError, ErrorKind, ExecError, RestoreError};
pub use self::executor::{CommandExecutor, CommandOutput, Invocation, ProcessExecutor, Stage};
pub use self::observer::{NoopObserver, RunObserver, TracingObserver};
pub use self::optimizer::{
    AttemptOutcome, FileOptimizer, FileResult, FileTask, FinalState, OptimizerOptions,
};
pub use self::report::{PassStats, RunReport};
pub use self::runner::{PassOutcome, PassRunner};
pub use self::scheduler::{OverallStatus, RunOptions, RunSummary, Scheduler};
pub use self::validator::{ValidationOutcome, Validator};
