//! User prompts raised by tool and configuration flows

use async_trait::async_trait;

/// A question put to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRequest {
    /// Install one or more missing tools
    InstallMissing { tools: Vec<String> },
    /// A newer release of `tool` is available
    UpdateTool { tool: String, latest: Option<String> },
    /// Settings changed in a way that needs a reload to apply
    ReloadForConfigChange,
    /// A setting is wrong; offer to open the settings
    OpenSettings { message: String },
}

impl PromptRequest {
    pub fn message(&self) -> String {
        match self {
            PromptRequest::InstallMissing { tools } if tools.len() == 1 => {
                format!("The \"{}\" command is not available. Install it?", tools[0])
            }
            PromptRequest::InstallMissing { tools } => {
                format!("Tools missing: {}. Install them?", tools.join(", "))
            }
            PromptRequest::UpdateTool { tool, latest } => match latest {
                Some(version) => format!("{} {} is available. Update?", tool, version),
                None => format!("Your version of {} appears to be out of date. Update?", tool),
            },
            PromptRequest::ReloadForConfigChange => {
                "Reload the editor for the configuration change to take effect.".to_string()
            }
            PromptRequest::OpenSettings { message } => message.clone(),
        }
    }

    /// Label of the accepting choice
    pub fn accept_label(&self) -> &'static str {
        match self {
            PromptRequest::InstallMissing { .. } => "Install",
            PromptRequest::UpdateTool { .. } => "Update",
            PromptRequest::ReloadForConfigChange => "Reload",
            PromptRequest::OpenSettings { .. } => "Open Settings",
        }
    }
}

/// The user's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    Accept,
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A notification with no choices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl UserMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}

/// Where prompts and messages are shown
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask the user; None when the prompt was dismissed
    async fn confirm(&self, request: PromptRequest) -> Option<PromptChoice>;

    /// Show a message
    async fn show(&self, message: UserMessage);
}
