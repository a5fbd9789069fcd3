//! Bounded execution of external programs.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use volsync_core::{BackendError, BackendResult};

/// Run `program` with `args` and return its stdout.
///
/// The child is killed if it outlives `timeout`. A non-zero exit status is
/// an error carrying stderr.
///
/// # Errors
/// Returns an error if the program cannot be started, times out, or fails.
pub async fn run<I, S>(program: &str, args: I, timeout: Duration) -> BackendResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BackendError::Spawn { program: program.to_string(), source })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => {
            result.map_err(|source| BackendError::Spawn { program: program.to_string(), source })?
        }
        Err(_) => {
            warn!(program, ?timeout, "Backend command timed out");
            return Err(BackendError::Timeout { program: program.to_string(), after: timeout });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(BackendError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(program, bytes = stdout.len(), "Backend command finished");
    Ok(stdout)
}
