//! Unit tests for the pass runner.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mockall::predicate::function;
use refiner_config::{CommandTemplate, PassDefinition};
use rstest::{fixture, rstest};

use super::*;
use crate::error::ExecError;
use crate::executor::CommandOutput;
use crate::test_support::MockExecutor;

#[fixture]
fn black() -> PassDefinition {
    let command = CommandTemplate::parse(&["black", "--quiet", "{file}"]).expect("template");
    PassDefinition::new("black", command)
}

fn workspace() -> PathBuf {
    PathBuf::from("/repo")
}

#[rstest]
fn renders_the_file_into_the_command(black: PassDefinition) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .with(function(|invocation: &Invocation| {
            invocation.argv()
                == [
                    OsString::from("black"),
                    OsString::from("--quiet"),
                    OsString::from("/repo/src/a.py"),
                ]
                && invocation.working_dir() == Path::new("/repo")
                && invocation.stage() == Stage::Apply
                && invocation.pass() == "black"
        }))
        .times(1)
        .returning(|_| Ok(CommandOutput::exited(0).with_streams("reformatted a.py", "")));

    let root = workspace();
    let runner = PassRunner::new(&executor, &root, None);
    let outcome = runner.run(&black, Path::new("/repo/src/a.py"));

    assert!(outcome.is_ok());
    assert_eq!(outcome.output(), "reformatted a.py");
    assert!(outcome.error().is_none());
}

#[rstest]
fn non_zero_exit_is_a_tool_failure_with_diagnostics(black: PassDefinition) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .returning(|_| Ok(CommandOutput::exited(123).with_streams("", "cannot parse a.py")));

    let root = workspace();
    let outcome = PassRunner::new(&executor, &root, None).run(&black, Path::new("/repo/a.py"));

    assert!(!outcome.is_ok());
    let error = outcome.error().expect("failure record");
    assert_eq!(error.kind(), ErrorKind::ToolFailure);
    assert!(error.message().contains("exited with status 123"));
    assert!(error.message().contains("cannot parse a.py"));
}

#[rstest]
fn timeout_is_a_tool_failure(black: PassDefinition) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .returning(|_| Ok(CommandOutput::timed_out()));

    let root = workspace();
    let runner = PassRunner::new(&executor, &root, Some(Duration::from_secs(7)));
    let outcome = runner.run(&black, Path::new("/repo/a.py"));

    let error = outcome.into_error().expect("failure record");
    assert_eq!(error.kind(), ErrorKind::ToolFailure);
    assert!(error.message().contains("timed out after 7s"));
}

#[rstest]
fn missing_executable_is_a_tool_invocation_error(black: PassDefinition) {
    let mut executor = MockExecutor::new();
    executor.expect_execute().returning(|_| {
        Err(ExecError::spawn(
            "black",
            io::Error::from(io::ErrorKind::NotFound),
        ))
    });

    let root = workspace();
    let outcome = PassRunner::new(&executor, &root, None).run(&black, Path::new("/repo/a.py"));

    let error = outcome.error().expect("failure record");
    assert_eq!(error.kind(), ErrorKind::ToolInvocation);
    assert!(error.message().contains("black"));
}

#[rstest]
fn wait_failure_is_retryable(black: PassDefinition) {
    let mut executor = MockExecutor::new();
    executor.expect_execute().returning(|_| {
        Err(ExecError::Io {
            program: "black".into(),
            source: Arc::new(io::Error::other("interrupted")),
        })
    });

    let root = workspace();
    let outcome = PassRunner::new(&executor, &root, None).run(&black, Path::new("/repo/a.py"));
    assert_eq!(
        outcome.error().map(AttemptError::kind),
        Some(ErrorKind::ToolFailure)
    );
}

#[rstest]
#[case(None, None, None)]
#[case(None, Some(10), Some(10))]
#[case(Some(3), Some(10), Some(3))]
#[case(Some(3), None, Some(3))]
fn pass_timeout_overrides_the_default(
    #[case] pass_secs: Option<u64>,
    #[case] default_secs: Option<u64>,
    #[case] expected_secs: Option<u64>,
) {
    let command = CommandTemplate::parse(&["ruff", "{file}"]).expect("template");
    let mut pass = PassDefinition::new("ruff", command);
    if let Some(secs) = pass_secs {
        pass = pass.with_timeout(Duration::from_secs(secs));
    }
    let expected = expected_secs.map(Duration::from_secs);

    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .with(function(move |invocation: &Invocation| {
            invocation.timeout() == expected
        }))
        .times(1)
        .returning(|_| Ok(CommandOutput::exited(0)));

    let root = workspace();
    let runner = PassRunner::new(&executor, &root, default_secs.map(Duration::from_secs));
    assert!(runner.run(&pass, Path::new("/repo/a.py")).is_ok());
}
