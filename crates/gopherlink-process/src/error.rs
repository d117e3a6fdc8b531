//! Error types for process management

use std::io;
use thiserror::Error;

/// Process management errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable does not exist
    #[error("Executable not found: {command}")]
    NotFound { command: String },

    /// Failed to spawn process
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(io::Error),

    /// Process timed out
    #[error("Process timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Process crashed or exited unexpectedly
    #[error("Process crashed: {reason}")]
    Crashed { reason: String },

    /// Failed to kill process
    #[error("Failed to kill process: {0}")]
    KillFailed(String),

    /// Failed talking to the process over stdio
    #[error("Process I/O failed: {0}")]
    Io(String),

    /// The invocation was cancelled by a newer one
    #[error("Process cancelled: {command}")]
    Cancelled { command: String },
}

impl ProcessError {
    /// Classify a spawn failure, separating a missing binary from other errors
    pub fn from_spawn(command: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ProcessError::NotFound {
                command: command.to_string(),
            }
        } else {
            ProcessError::SpawnFailed(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcessError::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessError::Cancelled { .. })
    }
}

impl From<io::Error> for ProcessError {
    fn from(err: io::Error) -> Self {
        ProcessError::Io(err.to_string())
    }
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = ProcessError::from_spawn("gocode", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());

        let err = ProcessError::from_spawn(
            "gocode",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_not_found());
    }
}
