//! Unit tests for the scheduler and its soft-stop policy.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use refiner_config::{Config, RollbackScope};
use rstest::rstest;

use super::*;
use crate::executor::Stage;
use crate::observer::NoopObserver;
use crate::test_support::{
    RecordingObserver, ScriptedExecutor, Step, pipeline, read, workspace,
};

fn lenient(concurrency: usize) -> RunOptions {
    RunOptions::new(concurrency)
        .with_optimizer(OptimizerOptions::new(2).with_ignore_failure(true))
}

fn strict(concurrency: usize) -> RunOptions {
    RunOptions::new(concurrency).with_optimizer(OptimizerOptions::new(2))
}

fn files(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

/// A passes `format` at once and then fails `lint` twice, B succeeds, C
/// passes `format` on its second attempt.
fn three_file_script() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .with(Stage::Apply, "format", "a.py", [Step::Rewrite("A formatted\n".into())])
        .with(Stage::Apply, "lint", "a.py", [Step::Append("x".into()), Step::Append("y".into())])
        .with(Stage::Validate, "lint", "a.py", [Step::Fail(1), Step::Fail(1)])
        .with(Stage::Apply, "format", "b.py", [Step::Append("formatted\n".into())])
        .with(Stage::Validate, "format", "c.py", [Step::Fail(1)])
}

#[test]
fn lenient_run_completes_every_file() {
    let dir = workspace(&[("a.py", "a\n"), ("b.py", "b\n"), ("c.py", "c\n")]);
    let executor = three_file_script();
    let passes = pipeline(&["format", "lint"]);

    let summary = Scheduler::new(&passes, &executor, dir.path(), lenient(2), &NoopObserver)
        .run(&files(&["a.py", "b.py", "c.py"]));

    assert_eq!(summary.overall_status(), OverallStatus::Completed);
    assert!(summary.skipped().is_empty());
    let state = |name: &str| summary.get(name).map(FileResult::final_state);
    assert_eq!(state("a.py"), Some(FinalState::RolledBack));
    assert_eq!(state("b.py"), Some(FinalState::Optimized));
    assert_eq!(state("c.py"), Some(FinalState::Optimized));
    assert!(summary.is_success());

    let a = summary.get("a.py").expect("a.py result");
    assert!(a.pass_succeeded("format"));
    assert_eq!(a.attempts_for("format").count(), 1);
    assert_eq!(a.attempts_for("lint").count(), 2);
    assert!(a.rollback_occurred());
    assert_eq!(read(&dir, "a.py"), "a\n");
    let b = summary.get("b.py").expect("b.py result");
    assert!(!b.rollback_occurred());
    assert_eq!(summary.get("c.py").map(|c| c.attempts_for("format").count()), Some(2));
}

#[test]
fn strict_run_soft_stops_after_the_first_failure() {
    let dir = workspace(&[("a.py", "a\n"), ("b.py", "b\n"), ("c.py", "c\n")]);
    let executor = three_file_script();
    let passes = pipeline(&["format", "lint"]);
    let observer = RecordingObserver::default();

    let summary = Scheduler::new(&passes, &executor, dir.path(), strict(1), &observer)
        .run(&files(&["a.py", "b.py", "c.py"]));

    assert_eq!(summary.overall_status(), OverallStatus::AbortedOnFailure);
    assert_eq!(summary.results().len(), 1);
    let a = summary.get("a.py").expect("a.py result");
    assert!(a.aborted());
    assert!(a.pass_succeeded("format"));
    assert_eq!(a.attempts_for("lint").count(), 2);
    assert_eq!(a.final_state(), FinalState::RolledBack);
    assert_eq!(read(&dir, "a.py"), "a\n");
    assert_eq!(summary.skipped(), files(&["b.py", "c.py"]).as_slice());
    assert_eq!(executor.calls_for("b.py"), 0);
    assert_eq!(executor.calls_for("c.py"), 0);
    assert!(!summary.is_success());

    let events = observer.events();
    assert!(events.contains(&String::from("soft_stop a.py")));
    assert!(!events.iter().any(|event| event == "started b.py" || event == "started c.py"));
}

#[test]
fn unreadable_file_does_not_stop_a_lenient_run() {
    let dir = workspace(&[("b.py", "b\n")]);
    let executor = ScriptedExecutor::new()
        .with(Stage::Apply, "format", "b.py", [Step::Append("formatted\n".into())]);
    let passes = pipeline(&["format"]);
    let observer = RecordingObserver::default();

    let summary = Scheduler::new(&passes, &executor, dir.path(), lenient(1), &observer)
        .run(&files(&["missing.py", "b.py"]));

    assert_eq!(summary.overall_status(), OverallStatus::Completed);
    assert!(summary.skipped().is_empty());
    let missing = summary.get("missing.py").expect("missing.py result");
    assert_eq!(missing.final_state(), FinalState::Failed);
    assert_eq!(missing.fatal().map(|e| e.kind()), Some(ErrorKind::Configuration));
    let b = summary.get("b.py").expect("b.py result");
    assert_eq!(b.final_state(), FinalState::Optimized);
    assert!(!summary.is_success());
    assert!(!observer.events().iter().any(|event| event.starts_with("soft_stop")));
}

#[test]
fn unreadable_file_stops_a_strict_run() {
    let dir = workspace(&[("b.py", "b\n")]);
    let executor = ScriptedExecutor::new();
    let passes = pipeline(&["format"]);

    let summary = Scheduler::new(&passes, &executor, dir.path(), strict(1), &NoopObserver)
        .run(&files(&["missing.py", "b.py"]));

    assert_eq!(summary.overall_status(), OverallStatus::AbortedOnFailure);
    assert_eq!(summary.skipped(), files(&["b.py"]).as_slice());
}

#[test]
fn rollback_errors_stop_the_run_even_when_failures_are_ignored() {
    let dir = workspace(&[("a.py", "a\n"), ("b.py", "b\n")]);
    let executor = ScriptedExecutor::new().with(Stage::Validate, "format", "a.py", [Step::Delete]);
    let passes = pipeline(&["format"]);

    let summary = Scheduler::new(&passes, &executor, dir.path(), lenient(1), &NoopObserver)
        .run(&files(&["a.py", "b.py"]));

    assert_eq!(summary.overall_status(), OverallStatus::AbortedOnFailure);
    let a = summary.get("a.py").expect("a.py result");
    assert_eq!(a.final_state(), FinalState::Failed);
    assert_eq!(a.fatal().map(|e| e.kind()), Some(ErrorKind::Rollback));
    assert_eq!(summary.skipped(), files(&["b.py"]).as_slice());
}

#[test]
fn duplicate_paths_are_processed_once() {
    let dir = workspace(&[("a.py", "a\n")]);
    let executor = ScriptedExecutor::new();
    let passes = pipeline(&["format"]);

    let summary = Scheduler::new(&passes, &executor, dir.path(), lenient(4), &NoopObserver)
        .run(&files(&["a.py", "a.py", "a.py"]));

    assert_eq!(summary.results().len(), 1);
    assert_eq!(executor.count(Stage::Apply, "format", "a.py"), 1);
}

#[test]
fn aliased_paths_are_processed_once() {
    let dir = workspace(&[("a.py", "a\n")]);
    let executor = ScriptedExecutor::new();
    let passes = pipeline(&["format"]);
    let aliases = vec![
        PathBuf::from("a.py"),
        PathBuf::from("./a.py"),
        dir.path().join("a.py"),
        PathBuf::from("sub/../a.py"),
    ];

    let summary = Scheduler::new(&passes, &executor, dir.path(), lenient(4), &NoopObserver)
        .run(&aliases);

    assert_eq!(summary.results().len(), 1);
    assert!(summary.get("a.py").is_some());
    assert_eq!(executor.count(Stage::Apply, "format", "a.py"), 1);
    assert_eq!(executor.count(Stage::Validate, "format", "a.py"), 1);
}

#[test]
fn aliases_of_a_missing_file_are_reported_once() {
    let dir = workspace(&[]);
    let executor = ScriptedExecutor::new();
    let passes = pipeline(&["format"]);

    let summary = Scheduler::new(&passes, &executor, dir.path(), lenient(2), &NoopObserver)
        .run(&files(&["gone.py", "./gone.py"]));

    assert_eq!(summary.results().len(), 1);
    assert!(summary.get("gone.py").is_some());
}

#[test]
fn empty_input_completes() {
    let dir = workspace(&[]);
    let executor = ScriptedExecutor::new();
    let passes = pipeline(&["format"]);

    let summary = Scheduler::new(&passes, &executor, dir.path(), strict(3), &NoopObserver)
        .run::<PathBuf>(&[]);

    assert_eq!(summary.overall_status(), OverallStatus::Completed);
    assert!(summary.results().is_empty());
}

fn outcomes(concurrency: usize) -> BTreeMap<String, (FinalState, bool)> {
    let names = ["a.py", "b.py", "c.py", "d.py", "e.py", "f.py"];
    let contents: Vec<_> = names.iter().map(|name| (*name, "orig\n")).collect();
    let dir = workspace(&contents);
    let executor = ScriptedExecutor::new()
        .with(Stage::Validate, "format", "a.py", [Step::Fail(1), Step::Fail(1)])
        .with(Stage::Apply, "format", "b.py", [Step::Missing])
        .with(Stage::Apply, "lint", "c.py", [Step::Fail(3), Step::Fail(3)])
        .with(Stage::Apply, "format", "d.py", [Step::Append("d\n".into())])
        .with(Stage::Validate, "lint", "e.py", [Step::TimeOut]);
    let passes = pipeline(&["format", "lint"]);

    let summary = Scheduler::new(
        &passes,
        &executor,
        dir.path(),
        lenient(concurrency),
        &NoopObserver,
    )
    .run(&files(&names));

    summary
        .results()
        .iter()
        .map(|result| {
            (
                result.path().display().to_string(),
                (result.final_state(), result.rollback_occurred()),
            )
        })
        .collect()
}

#[rstest]
#[case(2)]
#[case(3)]
#[case(8)]
fn concurrency_does_not_change_outcomes(#[case] concurrency: usize) {
    let sequential = outcomes(1);
    assert_eq!(sequential.len(), 6);
    assert_eq!(sequential.get("b.py"), Some(&(FinalState::Failed, false)));
    assert_eq!(sequential.get("a.py"), Some(&(FinalState::Optimized, true)));
    assert_eq!(outcomes(concurrency), sequential);
}

#[test]
fn options_follow_configuration() {
    let config = Config {
        concurrency: 6,
        max_iterations: 5,
        ignore_failure: true,
        timeout_secs: 30,
        rollback_scope: RollbackScope::SinceLastSuccess,
        ..Config::default()
    };

    let options = RunOptions::from_config(&config);

    assert_eq!(options.concurrency(), 6);
    let optimizer = options.optimizer();
    assert_eq!(optimizer.max_iterations(), 5);
    assert!(optimizer.ignore_failure());
    assert_eq!(optimizer.rollback_scope(), RollbackScope::SinceLastSuccess);
    assert_eq!(optimizer.timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn zero_concurrency_is_raised_to_one() {
    assert_eq!(RunOptions::new(0).concurrency(), 1);
}
