//! Error types for the protocol bridge and tool adapters

use gopherlink_config::ConfigError;
use gopherlink_process::ProcessError;
use gopherlink_tools::{ErrorKind, ToolsError};
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors from the language server connection and the fallback adapters
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No executable for a logical tool
    #[error("Tool '{tool}' is not installed")]
    MissingTool { tool: String },

    /// A fallback tool ran and failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// The tool invocation was superseded by a newer one
    #[error("Tool '{tool}' was cancelled")]
    Cancelled { tool: String },

    /// The server process could not be started
    #[error("Failed to start language server: {0}")]
    ServerStartFailed(String),

    /// The server answered with a JSON-RPC error
    #[error("Language server error {code}: {message}")]
    Server { code: i64, message: String },

    /// Malformed or unexpected protocol traffic
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection to the server is gone
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// A wait on the server ran past its deadline
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The server is not running
    #[error("Language server is not running")]
    NotRunning,

    #[error(transparent)]
    Tools(#[from] ToolsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn tool_error<T: Into<String>, M: Into<String>>(tool: T, message: M) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol(message.into())
    }

    /// Convert a process failure for `tool`
    pub fn from_process(tool: &str, err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { .. } => Self::MissingTool {
                tool: tool.to_string(),
            },
            ProcessError::Cancelled { .. } => Self::Cancelled {
                tool: tool.to_string(),
            },
            other => Self::tool_error(tool, other.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::MissingTool { .. } => ErrorKind::MissingTool,
            BridgeError::Tools(e) => e.kind(),
            BridgeError::Config(_) => ErrorKind::ConfigError,
            _ => ErrorKind::ToolError,
        }
    }

    /// Logical tool name when the failure is a missing tool
    pub fn missing_tool(&self) -> Option<&str> {
        match self {
            BridgeError::MissingTool { tool } => Some(tool),
            BridgeError::Tools(e) => e.missing_tool_name(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled { .. })
    }
}
