//! Child process execution with captured output and a hard timeout

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::WorkerError;

/// Everything a spawned entrypoint inherits from its deployment.
///
/// The working directory and environment are passed to each child
/// explicitly; the worker's own process state is never changed.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Directory the child runs in
    pub cwd: PathBuf,
    /// Directory for worker-private scratch files
    pub scratch_dir: PathBuf,
    /// Variables layered over the inherited environment
    pub env: HashMap<String, String>,
    /// Hard limit on the child's runtime
    pub timeout: Duration,
}

/// Captured result of a finished child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
}

/// Run `program` with `args` to completion inside `ctx`.
///
/// The child is killed when the timeout expires, and anything left in its
/// process group is killed once it returns. A non-zero exit code is returned
/// as data.
pub async fn run_captured<I, S>(
    program: &str,
    args: I,
    ctx: &ExecutionContext,
) -> Result<CapturedOutput, WorkerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&ctx.cwd)
        .envs(&ctx.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so leftover descendants can be killed together
    #[cfg(unix)]
    command.process_group(0);

    let description = describe(&command);
    debug!("Spawning: {}", description);

    let child = command.spawn().map_err(|source| WorkerError::SpawnError {
        program: program.to_string(),
        source,
    })?;

    let process_group = child.id();

    // Dropping the pending future drops the child, which kills it
    let waited = tokio::time::timeout(ctx.timeout, child.wait_with_output()).await;
    kill_process_group(process_group);

    let output = match waited {
        Ok(output) => output?,
        Err(_) => {
            warn!("Timed out after {:?}: {}", ctx.timeout, description);
            return Err(WorkerError::ExecutionTimeout {
                command: description,
                timeout: ctx.timeout,
            });
        }
    };

    let returncode = exit_code(&output.status);
    debug!("Exited with {}: {}", returncode, description);

    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        returncode,
    })
}

/// Exit code, or the negated signal number for a signalled child
fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// SIGKILL whatever is still running in the child's process group
#[cfg(unix)]
fn kill_process_group(process_group: Option<u32>) {
    let Some(pgid) = process_group.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // An empty group fails with ESRCH, which is the common case
    let killed = unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0;
    if killed {
        debug!("Killed leftover processes in group {}", pgid);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_process_group: Option<u32>) {}

/// Program and arguments, with inline scripts elided
fn describe(command: &Command) -> String {
    let std_command = command.as_std();
    std::iter::once(std_command.get_program())
        .chain(std_command.get_args())
        .map(|part| {
            let part = part.to_string_lossy();
            if part.contains('\n') {
                "<inline script>".to_string()
            } else {
                part.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
