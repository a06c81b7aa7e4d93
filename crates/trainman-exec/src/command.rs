//! Shell command execution with a bounded wait.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info};
use trainman_core::{ReleaseError, Result};

/// Captured outcome of one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,

    /// Exit code (`-1` when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last lines of stderr (or stdout when stderr is empty), for error messages.
    pub fn tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let all: Vec<&str> = source.trim_end().lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// Runs commands through `sh -c` inside a working directory.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` in `workdir`, returning its output whatever the exit code.
    ///
    /// A command still running after the timeout is killed and reported as
    /// [`ReleaseError::Timeout`].
    pub async fn run(&self, workdir: &Path, command: &str) -> Result<CommandOutput> {
        let start = Instant::now();
        if command.trim().is_empty() {
            return Err(ReleaseError::Config("empty command".to_string()));
        }

        debug!(command = %command, dir = %workdir.display(), "Running command");
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ReleaseError::Timeout {
                operation: command.to_string(),
                secs: self.timeout.as_secs(),
            })??;

        Ok(CommandOutput {
            command: command.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Like [`CommandRunner::run`], but a non-zero exit is a
    /// [`ReleaseError::Build`].
    pub async fn run_checked(&self, workdir: &Path, command: &str) -> Result<CommandOutput> {
        let output = self.run(workdir, command).await?;
        if !output.success() {
            return Err(ReleaseError::Build {
                command: command.to_string(),
                reason: format!("exit code {}: {}", output.exit_code, output.tail(20)),
            });
        }
        info!(command = %command, duration_ms = output.duration_ms, "Command succeeded");
        Ok(output)
    }

    /// Run `commands` in order, stopping at the first failure.
    pub async fn run_all(&self, workdir: &Path, commands: &[String]) -> Result<()> {
        for command in commands {
            self.run_checked(workdir, command).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            command: "test".to_string(),
            exit_code: 1,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_tail_prefers_stderr() {
        assert_eq!(output("out", "a\nb\nc\n").tail(2), "b\nc");
        assert_eq!(output("x\ny", "  ").tail(5), "x\ny");
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let err = runner.run(Path::new("."), "  ").await.unwrap_err();
        assert!(matches!(err, ReleaseError::Config(_)));
    }
}
