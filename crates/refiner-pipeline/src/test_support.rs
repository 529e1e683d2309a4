//! Test doubles shared by the unit and behaviour tests.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use mockall::mock;
use refiner_config::{CommandTemplate, PassDefinition, PipelineDefinition, RollbackScope};
use tempfile::TempDir;

use crate::error::{AttemptError, ExecError};
use crate::executor::{CommandExecutor, CommandOutput, Invocation, Stage};
use crate::observer::RunObserver;
use crate::optimizer::{AttemptOutcome, FileResult};

mock! {
    pub Executor {}
    impl CommandExecutor for Executor {
        fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError>;
    }
}

/// What a scripted invocation does.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Exit zero without touching the file.
    Succeed,
    /// Replace the file content, then exit zero.
    Rewrite(String),
    /// Append to the file, then exit zero.
    Append(String),
    /// Delete the file, then exit zero.
    Delete,
    /// Exit with the code.
    Fail(i32),
    /// Report a missing executable.
    Missing,
    /// Report a timeout.
    TimeOut,
}

type Key = (Stage, String, String);

/// Executor replaying per-file scripts keyed by stage, pass and file name.
///
/// Invocations without a remaining scripted step succeed.
#[derive(Debug, Default)]
pub(crate) struct ScriptedExecutor {
    scripts: Mutex<HashMap<Key, VecDeque<Step>>>,
    calls: Mutex<Vec<Key>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues steps for `pass` at `stage` on the file called `file`.
    pub(crate) fn script(
        &self,
        stage: Stage,
        pass: &str,
        file: &str,
        steps: impl IntoIterator<Item = Step>,
    ) {
        lock(&self.scripts)
            .entry((stage, pass.to_owned(), file.to_owned()))
            .or_default()
            .extend(steps);
    }

    /// Builder form of [`Self::script`].
    pub(crate) fn with(
        self,
        stage: Stage,
        pass: &str,
        file: &str,
        steps: impl IntoIterator<Item = Step>,
    ) -> Self {
        self.script(stage, pass, file, steps);
        self
    }

    /// Number of invocations recorded for `file`.
    pub(crate) fn calls_for(&self, file: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|(_, _, name)| name == file)
            .count()
    }

    /// Number of invocations at `stage` for `pass` on `file`.
    pub(crate) fn count(&self, stage: Stage, pass: &str, file: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|(s, p, f)| *s == stage && p == pass && f == file)
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        let key = (
            invocation.stage(),
            invocation.pass().to_owned(),
            file_name(invocation.file()),
        );
        lock(&self.calls).push(key.clone());
        let step = lock(&self.scripts)
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Succeed);

        match step {
            Step::Succeed => Ok(CommandOutput::exited(0)),
            Step::Rewrite(content) => {
                fs::write(invocation.file(), content)
                    .map_err(|err| ExecError::spawn("rewrite", err))?;
                Ok(CommandOutput::exited(0))
            }
            Step::Append(text) => {
                fs::OpenOptions::new()
                    .append(true)
                    .open(invocation.file())
                    .and_then(|mut file| file.write_all(text.as_bytes()))
                    .map_err(|err| ExecError::spawn("append", err))?;
                Ok(CommandOutput::exited(0))
            }
            Step::Delete => {
                fs::remove_file(invocation.file())
                    .map_err(|err| ExecError::spawn("delete", err))?;
                Ok(CommandOutput::exited(0))
            }
            Step::Fail(code) => Ok(CommandOutput::exited(code).with_streams("", "scripted failure")),
            Step::Missing => Err(ExecError::spawn(
                invocation.program(),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )),
            Step::TimeOut => Ok(CommandOutput::timed_out()),
        }
    }
}

/// Observer recording events as short strings.
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    fn push(&self, event: String) {
        lock(&self.events).push(event);
    }
}

impl RunObserver for RecordingObserver {
    fn file_started(&self, path: &Path) {
        self.push(format!("started {}", path.display()));
    }

    fn attempt_finished(&self, path: &Path, attempt: &AttemptOutcome) {
        self.push(format!(
            "attempt {} {}#{}",
            path.display(),
            attempt.pass(),
            attempt.iteration()
        ));
    }

    fn rolled_back(&self, path: &Path, pass: &str, scope: RollbackScope) {
        self.push(format!("rolled_back {} {pass} {scope}", path.display()));
    }

    fn file_finished(&self, result: &FileResult) {
        self.push(format!(
            "finished {} {}",
            result.path().display(),
            result.final_state()
        ));
    }

    fn soft_stop(&self, path: &Path, _reason: Option<&AttemptError>) {
        self.push(format!("soft_stop {}", path.display()));
    }

    fn file_skipped(&self, path: &Path) {
        self.push(format!("skipped {}", path.display()));
    }
}

/// Pipeline with the named passes, each a placeholder command.
pub(crate) fn pipeline(passes: &[&str]) -> PipelineDefinition {
    let passes = passes
        .iter()
        .map(|name| {
            let command = CommandTemplate::parse(&[*name, "{file}"]).expect("pass template");
            PassDefinition::new(*name, command)
        })
        .collect();
    let validation = CommandTemplate::parse(&["check", "{workspace}"]).expect("validation");
    PipelineDefinition::new(validation, passes).expect("pipeline")
}

/// Temporary workspace holding the given files.
pub(crate) fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("temp workspace");
    for (name, content) in files {
        fs::write(dir.path().join(name), content).expect("write workspace file");
    }
    dir
}

/// Reads a workspace file as text.
pub(crate) fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).expect("read workspace file")
}

/// Relative path of a workspace file.
pub(crate) fn rel(name: &str) -> PathBuf {
    PathBuf::from(name)
}
