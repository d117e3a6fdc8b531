//! Process manager - lifecycle orchestration

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    child::ManagedChild,
    config::ProcessConfig,
    error::{ProcessError, Result},
};

/// Spawns managed processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        Self
    }

    /// Spawn a managed process.
    ///
    /// A missing executable is reported as [`ProcessError::NotFound`] so callers
    /// can offer to install the tool.
    ///
    /// ```no_run
    /// use gopherlink_process::{ProcessConfig, ProcessManager};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let manager = ProcessManager::new();
    /// let mut child = manager.spawn(ProcessConfig::new("gopls").args(["serve"])).await?;
    /// child.kill_tree().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn spawn(&self, config: ProcessConfig) -> Result<ManagedChild> {
        debug!(
            command = %config.command,
            args = ?config.args,
            "Spawning process"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(if config.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stderr(if config.capture_stderr {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.kill_on_drop(true);

        // own process group so kill_tree reaches grandchildren
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::from_spawn(&config.command, e))?;
        let pid = child.id().ok_or_else(|| ProcessError::Crashed {
            reason: format!("{} exited before its pid was read", config.command),
        })?;

        info!(pid = %pid, command = %config.command, "Process spawned");

        Ok(ManagedChild::new(child, config))
    }
}
