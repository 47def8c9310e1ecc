// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess plumbing for `os` steps.
//!
//! The task string is handed to the host shell verbatim so quoting, pipes,
//! and redirections behave as a shell user expects. Stdout and stderr go
//! directly to the step's capture files.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long a terminated shell gets to exit before SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("cannot open capture file {}: {source}", .path.display())]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),
}

/// How a command run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandExit {
    /// The shell exited on its own with this code (-1 when killed by a
    /// signal outside our control).
    Exited(i32),
    /// We terminated the shell because the job was canceled.
    Terminated,
}

/// Run a command line through the shell, capturing output to files.
///
/// When `cancel` fires while the command is still running, the shell
/// receives SIGTERM, then SIGKILL after [`KILL_GRACE`], and the call
/// returns [`CommandExit::Terminated`].
pub async fn run_command(
    cmdline: &str,
    stdout_path: &Path,
    stderr_path: &Path,
    cancel: &CancellationToken,
) -> Result<CommandExit, SpawnError> {
    let stdout = open_capture(stdout_path)?;
    let stderr = open_capture(stderr_path)?;

    let mut child = Command::new("bash")
        .arg("-c")
        .arg(cmdline)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(SpawnError::Spawn)?;

    tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    tracing::error!(error = %e, "wait on shell child failed");
                    -1
                }
            };
            Ok(CommandExit::Exited(code))
        }
        _ = cancel.cancelled() => {
            terminate(&mut child).await;
            Ok(CommandExit::Terminated)
        }
    }
}

fn open_capture(path: &Path) -> Result<std::fs::File, SpawnError> {
    std::fs::File::create(path).map_err(|e| SpawnError::Capture {
        path: path.to_path_buf(),
        source: e,
    })
}

/// SIGTERM the shell, give it [`KILL_GRACE`] to exit, then SIGKILL.
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
