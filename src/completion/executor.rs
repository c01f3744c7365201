//! Process execution for script generators
//!
//! Generators never spawn processes directly; they go through a
//! [`CommandExecutor`] so that callers can substitute their own shell bridge
//! and tests can run without touching the system.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::GeneratorError;

/// Working directory and environment of the shell being completed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellContext {
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    /// Name of the running shell, e.g. `bash`
    pub shell: Option<String>,
}

impl ShellContext {
    /// Context of the current process
    pub fn from_process() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_default(),
            env: std::env::vars().collect(),
            shell: std::env::var("SHELL")
                .ok()
                .and_then(|s| s.rsplit('/').next().map(str::to_string)),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }
}

/// Result of running a process to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecuteOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Capability to run external commands
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` and collect its output
    ///
    /// # Arguments
    /// * `program` - Executable name or path
    /// * `args` - Arguments
    /// * `context` - Working directory and environment
    /// * `limit` - Time after which the process is abandoned
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        context: &ShellContext,
        limit: Duration,
    ) -> Result<ExecuteOutput, GeneratorError>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        context: &ShellContext,
        limit: Duration,
    ) -> Result<ExecuteOutput, GeneratorError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&context.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !context.cwd.as_os_str().is_empty() {
            cmd.current_dir(&context.cwd);
        }

        let child = cmd
            .spawn()
            .map_err(|e| GeneratorError::Spawn(format!("{program}: {e}")))?;

        // Dropping the future on timeout drops the child, which kills it
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| GeneratorError::Spawn(format!("{program}: {e}")))?,
            Err(_) => {
                return Err(GeneratorError::Timeout {
                    command: program.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                });
            }
        };

        Ok(ExecuteOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_executor_captures_stdout() {
        let output = ProcessExecutor
            .execute(
                "sh",
                &["-c".to_string(), "printf 'a\\nb'".to_string()],
                &ShellContext::default(),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "a\nb");
    }

    #[tokio::test]
    async fn test_process_executor_reports_exit_code() {
        let output = ProcessExecutor
            .execute(
                "sh",
                &["-c".to_string(), "echo oops >&2; exit 3".to_string()],
                &ShellContext::default(),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_process_executor_times_out() {
        let err = ProcessExecutor
            .execute(
                "sh",
                &["-c".to_string(), "sleep 5".to_string()],
                &ShellContext::default(),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Timeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ProcessExecutor
            .execute(
                "definitely-not-a-real-program-xyz",
                &[],
                &ShellContext::default(),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Spawn(_)));
    }
}
