//! Aggregate statistics over a finished run.

use serde::Serialize;

use crate::optimizer::FinalState;
use crate::scheduler::{OverallStatus, RunSummary};

/// Counters for one pass across every file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassStats {
    name: String,
    files_attempted: usize,
    files_succeeded: usize,
    attempts: usize,
}

impl PassStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            files_attempted: 0,
            files_succeeded: 0,
            attempts: 0,
        }
    }

    /// Pass name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Files on which the pass ran at least once.
    #[must_use]
    pub const fn files_attempted(&self) -> usize {
        self.files_attempted
    }

    /// Files on which some attempt of the pass validated.
    #[must_use]
    pub const fn files_succeeded(&self) -> usize {
        self.files_succeeded
    }

    /// Attempts across all files.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }
}

/// Summary counts of a run, suitable for result sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    overall_status: OverallStatus,
    optimized: usize,
    rolled_back: usize,
    failed: usize,
    skipped: usize,
    attempts: usize,
    passes: Vec<PassStats>,
    pass_success_rate: Option<f64>,
}

impl RunReport {
    /// Aggregates a run summary.
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        let mut passes: Vec<PassStats> = Vec::new();
        let (mut optimized, mut rolled_back, mut failed) = (0, 0, 0);

        for result in summary.results() {
            match result.final_state() {
                FinalState::Optimized => optimized += 1,
                FinalState::RolledBack => rolled_back += 1,
                FinalState::Failed => failed += 1,
            }
            let mut seen: Vec<&str> = Vec::new();
            for attempt in result.attempts() {
                let position = match passes.iter().position(|stats| stats.name == attempt.pass()) {
                    Some(position) => position,
                    None => {
                        passes.push(PassStats::new(attempt.pass()));
                        passes.len() - 1
                    }
                };
                let Some(stats) = passes.get_mut(position) else {
                    continue;
                };
                stats.attempts += 1;
                if !seen.contains(&attempt.pass()) {
                    seen.push(attempt.pass());
                    stats.files_attempted += 1;
                    if result.pass_succeeded(attempt.pass()) {
                        stats.files_succeeded += 1;
                    }
                }
            }
        }

        let attempted: usize = passes.iter().map(PassStats::files_attempted).sum();
        let succeeded: usize = passes.iter().map(PassStats::files_succeeded).sum();
        Self {
            overall_status: summary.overall_status(),
            optimized,
            rolled_back,
            failed,
            skipped: summary.skipped().len(),
            attempts: passes.iter().map(PassStats::attempts).sum(),
            passes,
            pass_success_rate: success_rate(succeeded, attempted),
        }
    }

    /// Overall status of the run.
    #[must_use]
    pub const fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    /// Files that ended [`FinalState::Optimized`].
    #[must_use]
    pub const fn optimized(&self) -> usize {
        self.optimized
    }

    /// Files that ended [`FinalState::RolledBack`].
    #[must_use]
    pub const fn rolled_back(&self) -> usize {
        self.rolled_back
    }

    /// Files that ended [`FinalState::Failed`].
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Files never started.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Attempts across all files and passes.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }

    /// Per-pass statistics in the order passes were first seen.
    #[must_use]
    pub fn passes(&self) -> &[PassStats] {
        &self.passes
    }

    /// Succeeded (file, pass) pairs over attempted pairs; absent when
    /// nothing was attempted.
    #[must_use]
    pub const fn pass_success_rate(&self) -> Option<f64> {
        self.pass_success_rate
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::float_arithmetic,
    reason = "file counts stay far below f64 precision limits"
)]
fn success_rate(succeeded: usize, attempted: usize) -> Option<f64> {
    (attempted > 0).then(|| succeeded as f64 / attempted as f64)
}
