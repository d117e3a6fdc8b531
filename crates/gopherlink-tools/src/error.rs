//! Error types for tool management

use gopherlink_config::ConfigError;
use gopherlink_process::ProcessError;
use thiserror::Error;

/// Result type alias for tool operations
pub type Result<T> = std::result::Result<T, ToolsError>;

/// How a failure should be surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recoverable; offer to install the tool and degrade to a no-op answer
    MissingTool,
    /// Logged, with a generic message for the user
    ToolError,
    /// The update check is skipped
    NetworkError,
    /// Actionable message with a way to open the settings
    ConfigError,
}

/// Errors raised while resolving, running, installing or updating tools
#[derive(Debug, Error)]
pub enum ToolsError {
    /// No executable could be found for a logical tool name
    #[error("Tool '{tool}' is not installed")]
    MissingTool { tool: String },

    /// The tool ran but failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// HTTP transport errors
    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// The module registry answered, but not usefully
    #[error("Registry request failed: {message}")]
    Registry { message: String },

    /// Bad or missing settings
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ToolsError {
    /// Create a missing tool error
    pub fn missing_tool<S: Into<String>>(tool: S) -> Self {
        Self::MissingTool { tool: tool.into() }
    }

    /// Create a tool failure
    pub fn tool_error<T: Into<String>, M: Into<String>>(tool: T, message: M) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a registry error
    pub fn registry<S: Into<String>>(message: S) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Convert a process failure, keeping a missing binary distinguishable
    pub fn from_process(tool: &str, err: ProcessError) -> Self {
        if err.is_not_found() {
            Self::missing_tool(tool)
        } else {
            Self::tool_error(tool, err.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolsError::MissingTool { .. } => ErrorKind::MissingTool,
            ToolsError::ToolFailed { .. } => ErrorKind::ToolError,
            ToolsError::Network { .. } | ToolsError::Registry { .. } => ErrorKind::NetworkError,
            ToolsError::Config(_) => ErrorKind::ConfigError,
        }
    }

    /// Logical tool name for a missing tool
    pub fn missing_tool_name(&self) -> Option<&str> {
        match self {
            ToolsError::MissingTool { tool } => Some(tool),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_not_found_becomes_missing_tool() {
        let err = ToolsError::from_process(
            "godef",
            ProcessError::NotFound {
                command: "/usr/bin/godef".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::MissingTool);
        assert_eq!(err.missing_tool_name(), Some("godef"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            ToolsError::from_process("godef", ProcessError::Crashed { reason: "x".into() }).kind(),
            ErrorKind::ToolError
        );
        assert_eq!(ToolsError::registry("502").kind(), ErrorKind::NetworkError);
        assert_eq!(
            ToolsError::from(ConfigError::Validation("bad".into())).kind(),
            ErrorKind::ConfigError
        );
    }
}
