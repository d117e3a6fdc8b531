//! Managed child process wrapper

use std::time::Duration;
use tokio::process::Child;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::ProcessConfig,
    error::{ProcessError, Result},
};

/// Grace period between SIGTERM and SIGKILL
const SIGKILL_TIMEOUT_MS: u64 = 200;

/// Wrapper around tokio::process::Child with lifecycle management
pub struct ManagedChild {
    /// The spawned tokio process
    child: Child,
    /// Configuration the process was spawned from
    config: ProcessConfig,
    /// Pid read at spawn time; 0 if the process had already exited
    pid: u32,
}

impl ManagedChild {
    /// Wrap a freshly spawned child
    pub(crate) fn new(child: Child, config: ProcessConfig) -> Self {
        let pid = child.id().unwrap_or(0);
        Self { child, config, pid }
    }

    /// Process id, also the process group id on Unix
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Configuration the process was spawned with
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Whether the process has not exited yet; a failed status check counts as exited
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait for the process to exit, bounded by the configured timeout
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        match self.config.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.child.wait())
                .await
                .map_err(|_| ProcessError::Timeout {
                    seconds: timeout.as_secs(),
                })?
                .map_err(Into::into),
            None => self.child.wait().await.map_err(Into::into),
        }
    }

    /// Kill the process and everything it spawned.
    ///
    /// Go tools such as `go vet` fork compilers; killing only the parent would
    /// leave them running after a cancellation.
    pub async fn kill_tree(&mut self) -> Result<()> {
        debug!(pid = %self.pid, "Killing process tree");

        #[cfg(windows)]
        {
            use tokio::process::Command;

            let mut killer = Command::new("taskkill")
                .args(["/pid", &self.pid.to_string(), "/f", "/t"])
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
                .map_err(|e| ProcessError::KillFailed(e.to_string()))?;

            let _ = killer.wait().await;
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let pgid = Pid::from_raw(self.pid as i32);

            if let Err(e) = killpg(pgid, Signal::SIGTERM) {
                warn!(pid = %self.pid, error = %e, "Failed to send SIGTERM, killing process only");
                let _ = self.child.kill().await;
            }

            sleep(Duration::from_millis(SIGKILL_TIMEOUT_MS)).await;

            if self.is_running() {
                if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                    warn!(pid = %self.pid, error = %e, "Failed to send SIGKILL, killing process only");
                    let _ = self.child.kill().await;
                }
            }
            let _ = self.child.wait().await;
        }

        #[allow(unreachable_code)]
        Ok(())
    }

    /// Take the stdin pipe; None once taken or when stdin was not piped
    pub fn stdin(&mut self) -> Option<tokio::process::ChildStdin> {
        self.child.stdin.take()
    }

    /// Take the stdout pipe; None once taken or when stdout was not captured
    pub fn stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr pipe; None once taken or when stderr was not captured
    pub fn stderr(&mut self) -> Option<tokio::process::ChildStderr> {
        self.child.stderr.take()
    }
}
