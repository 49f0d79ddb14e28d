//! Child process execution.

use futures::future::BoxFuture;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Exit status reported when a process could not be spawned or was killed
/// by a signal.
pub const SPAWN_FAILURE_STATUS: i32 = -1;

/// Exit status and captured text of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or [`SPAWN_FAILURE_STATUS`].
    pub status: i32,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that ran and exited with `status`.
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Output standing in for a command that never ran.
    pub fn spawn_failure() -> Self {
        Self::new(SPAWN_FAILURE_STATUS, "", "")
    }

    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs external commands to completion.
///
/// Implementations must not block the calling task while the child runs, so
/// that fallback messages can still be delivered during a slow command.
/// Spawn failures are reported as [`CommandOutput::spawn_failure`], never
/// swallowed; the caller decides how much failure to tolerate.
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    fn run<'a>(&'a self, program: &'a Path, args: &'a [OsString]) -> BoxFuture<'a, CommandOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run<'a>(&'a self, program: &'a Path, args: &'a [OsString]) -> BoxFuture<'a, CommandOutput> {
        Box::pin(async move {
            let mut command = Command::new(program);
            command
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let output = match command.output().await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(program = %program.display(), error = %e, "failed to spawn");
                    return CommandOutput::spawn_failure();
                }
            };

            let status = output.status.code().unwrap_or(SPAWN_FAILURE_STATUS);
            let result = CommandOutput::new(
                status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            );
            tracing::debug!(program = %program.display(), status, "command finished");
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_run_captures_stdout_and_status() {
        let path = PathBuf::from("/bin/sh");
        if !path.exists() {
            return;
        }
        let args = vec![OsString::from("-c"), OsString::from("echo hello; echo oops >&2; exit 3")];
        let output = SystemRunner.run(&path, &args).await;
        assert_eq!(output.status, 3);
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_run_nonexistent_reports_synthetic_status() {
        let path = PathBuf::from("/nonexistent/path/to/hdiutil");
        let output = SystemRunner.run(&path, &[]).await;
        assert_eq!(output, CommandOutput::spawn_failure());
        assert_eq!(output.status, SPAWN_FAILURE_STATUS);
        assert!(output.stdout.is_empty());
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn test_success_only_for_zero() {
        assert!(CommandOutput::new(0, "", "").success());
        assert!(!CommandOutput::new(1, "", "").success());
        assert!(!CommandOutput::spawn_failure().success());
    }
}
