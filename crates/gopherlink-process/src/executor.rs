//! One-shot tool execution with stdin feeding and cancellation

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::ProcessConfig,
    error::{ProcessError, Result},
    manager::ProcessManager,
};

/// Captured result of a finished tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code; None when the process was killed by a signal
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Both streams joined, stdout first
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs an external tool to completion.
///
/// A cancelled invocation kills the whole process tree and resolves to
/// [`ProcessError::Cancelled`]; its output is discarded.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        config: ProcessConfig,
        cancel: Option<CancellationToken>,
    ) -> Result<ExecOutput>;
}

/// Executor backed by real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    manager: ProcessManager,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolExecutor for SystemExecutor {
    async fn execute(
        &self,
        config: ProcessConfig,
        cancel: Option<CancellationToken>,
    ) -> Result<ExecOutput> {
        let command = config.command.clone();
        let input = config.stdin.clone();
        debug!(command = %config.display(), "Executing tool");

        let mut child = self.manager.spawn(config).await?;
        let stdin = child.stdin();
        let stdout = child.stdout();
        let stderr = child.stderr();

        let write = async move {
            if let Some(mut pipe) = stdin {
                if let Some(text) = input {
                    // tools that exit without reading stdin close the pipe early
                    if let Err(e) = pipe.write_all(text.as_bytes()).await {
                        debug!(error = %e, "Tool closed stdin before reading it");
                    }
                }
                let _ = pipe.shutdown().await;
            }
        };
        let read_out = async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout {
                pipe.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let read_err = async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr {
                pipe.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let io = async { tokio::join!(write, read_out, read_err) };

        let token = cancel.unwrap_or_default();

        let ((), out, err) = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(command = %command, pid = %child.pid(), "Tool cancelled");
                if let Err(e) = child.kill_tree().await {
                    warn!(command = %command, error = %e, "Failed to kill cancelled tool");
                }
                return Err(ProcessError::Cancelled { command });
            }
            streams = io => streams,
        };

        let status = tokio::select! {
            biased;
            _ = token.cancelled() => {
                let _ = child.kill_tree().await;
                return Err(ProcessError::Cancelled { command });
            }
            status = child.wait() => status?,
        };

        let output = ExecOutput {
            status_code: status.code(),
            stdout: String::from_utf8_lossy(&out?).into_owned(),
            stderr: String::from_utf8_lossy(&err?).into_owned(),
        };
        debug!(command = %command, code = ?output.status_code, "Tool finished");
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stdin_is_fed_and_closed() {
        let executor = SystemExecutor::new();
        let config = ProcessConfig::new("cat").stdin("package main\n");

        let output = executor.execute(config, None).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "package main\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let executor = SystemExecutor::new();
        let config = ProcessConfig::new("sh").args(["-c", "echo oops >&2; exit 3"]);

        let output = executor.execute(config, None).await.unwrap();
        assert!(!output.success());
        assert_eq!(output.status_code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.combined().trim(), "oops");
    }

    #[tokio::test]
    async fn test_missing_tool_is_not_found() {
        let executor = SystemExecutor::new();
        let err = executor
            .execute(ProcessConfig::new("gopherlink-missing-gocode"), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancel_kills_running_tool() {
        let executor = SystemExecutor::new();
        let token = CancellationToken::new();
        let config = ProcessConfig::new("sleep").args(["30"]);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = executor.execute(config, Some(token)).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
