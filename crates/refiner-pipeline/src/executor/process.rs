//! Child-process execution with pipe draining and timeouts.
//!
//! [`ProcessExecutor`] spawns the rendered command with stdin closed and both
//! output streams piped. Each stream is drained on its own thread so a chatty
//! tool cannot block on a full pipe buffer while the executor polls for exit.
//! On Unix the child leads a fresh process group. A timeout kills the whole
//! group, and so does a normal exit: background grandchildren would
//! otherwise keep the output pipes open and stall the drain threads.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{CommandExecutor, CommandOutput, Invocation};
use crate::error::ExecError;

/// Tracing target for process execution.
const EXECUTOR_TARGET: &str = "refiner_pipeline::executor";

/// Delay between exit polls while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs invocations as operating-system processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Creates an executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        let Some((program, args)) = invocation.argv().split_first() else {
            return Err(ExecError::EmptyCommand {
                label: invocation.pass().to_owned(),
            });
        };
        let label = program.to_string_lossy().into_owned();

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(invocation.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        debug!(
            target: EXECUTOR_TARGET,
            stage = %invocation.stage(),
            pass = invocation.pass(),
            program = %label,
            file = %invocation.file().display(),
            "spawning process"
        );

        let mut child = command
            .spawn()
            .map_err(|err| ExecError::spawn(label.as_str(), err))?;
        let stdout = spawn_drain(child.stdout.take());
        let stderr = spawn_drain(child.stderr.take());

        let waited = wait_for_exit(&label, &mut child, invocation.timeout());
        match waited {
            Ok(WaitOutcome::Exited(_)) => kill_group(&label, child.id()),
            Ok(WaitOutcome::TimedOut) => {}
            Err(_) => terminate(&label, &mut child),
        }
        let stdout = join_drain(stdout);
        let stderr = join_drain(stderr);

        let output = match waited? {
            WaitOutcome::Exited(status) => exit_output(status),
            WaitOutcome::TimedOut => CommandOutput::timed_out(),
        };
        debug!(
            target: EXECUTOR_TARGET,
            program = %label,
            status = ?output.status(),
            timed_out = output.is_timed_out(),
            "process finished"
        );
        Ok(output.with_streams(stdout, stderr))
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
}

/// Waits for the child, killing it once `timeout` elapses.
fn wait_for_exit(
    label: &str,
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<WaitOutcome, ExecError> {
    let io_error = |err: std::io::Error| ExecError::Io {
        program: label.to_owned(),
        source: Arc::new(err),
    };
    let Some(limit) = timeout else {
        return child.wait().map(WaitOutcome::Exited).map_err(io_error);
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(io_error)? {
            return Ok(WaitOutcome::Exited(status));
        }
        if start.elapsed() >= limit {
            warn!(
                target: EXECUTOR_TARGET,
                program = label,
                timeout_secs = limit.as_secs(),
                "process timed out, killing it"
            );
            terminate(label, child);
            return Ok(WaitOutcome::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills the child and its process group, then reaps it.
fn terminate(label: &str, child: &mut Child) {
    kill_group(label, child.id());
    if let Err(err) = child.kill() {
        debug!(target: EXECUTOR_TARGET, program = label, error = %err, "kill failed");
    }
    drop(child.wait());
}

/// Sends `SIGKILL` to every process left in the group led by `pid`.
///
/// The group outlives a reaped leader while any member is alive, so the ID
/// cannot have been recycled for another group.
#[cfg(unix)]
fn kill_group(label: &str, pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: `kill(2)` has no memory-safety preconditions. A negative PID
    // addresses the group the child leads; an empty group only yields ESRCH.
    let result = unsafe { libc::kill(-pid, libc::SIGKILL) };
    if result != 0 {
        let error = std::io::Error::last_os_error();
        if error.raw_os_error() != Some(libc::ESRCH) {
            debug!(
                target: EXECUTOR_TARGET,
                program = label,
                error = %error,
                "process group kill failed"
            );
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_label: &str, _pid: u32) {}

fn spawn_drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            drop(reader.read_to_end(&mut buffer));
            buffer
        })
    })
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|drain| drain.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn exit_output(status: ExitStatus) -> CommandOutput {
    status
        .code()
        .map_or_else(CommandOutput::terminated, CommandOutput::exited)
}
