//! Commands the editor can invoke by name

use std::fmt;
use std::str::FromStr;

use gopherlink_tools::{UserMessage, LANGUAGE_SERVER};
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionCommand {
    /// Stop the language server, start it again and renegotiate
    RestartServer,
    /// Offer to install every missing important tool
    PromptForInstall,
    /// Check the language server for updates and offer one
    PromptForUpdate,
}

impl SessionCommand {
    pub const ALL: [SessionCommand; 3] = [
        SessionCommand::RestartServer,
        SessionCommand::PromptForInstall,
        SessionCommand::PromptForUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::RestartServer => "restart-server",
            SessionCommand::PromptForInstall => "prompt-for-install",
            SessionCommand::PromptForUpdate => "prompt-for-update",
        }
    }
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SessionCommand {
    type Err = BridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        SessionCommand::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| BridgeError::protocol(format!("Unknown command: {}", s)))
    }
}

impl Session {
    /// Run a named command.
    ///
    /// Commands are explicit requests, so they prompt even when the automatic
    /// flows already asked or were declined this session.
    pub async fn execute(&self, command: SessionCommand) -> Result<()> {
        info!(command = %command, "Running command");
        match command {
            SessionCommand::RestartServer => self.restart_server().await,
            SessionCommand::PromptForInstall => {
                self.installer
                    .prompt_for_install(self.module_mode, &self.state, self.prompter.as_ref())
                    .await;
                Ok(())
            }
            SessionCommand::PromptForUpdate => {
                match &self.version_gate {
                    Some(gate) => {
                        let outcome = self
                            .installer
                            .prompt_for_update_now(
                                LANGUAGE_SERVER,
                                gate,
                                &self.state,
                                self.prompter.as_ref(),
                            )
                            .await;
                        self.after_update(outcome).await;
                    }
                    None => {
                        self.prompter
                            .show(UserMessage::warning(
                                "Update checks are unavailable; check the http_proxy setting.",
                            ))
                            .await
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::test_support::FakeLauncher;
    use crate::session::test_support::harness;
    use gopherlink_config::ExtensionConfig;
    use gopherlink_tools::{MessageLevel, PromptRequest};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_names_parse_back() {
        for command in SessionCommand::ALL {
            assert_eq!(command.name().parse::<SessionCommand>().unwrap(), command);
        }
        assert!("reload".parse::<SessionCommand>().is_err());
    }

    #[tokio::test]
    async fn test_restart_command_starts_new_server() {
        let config = ExtensionConfig {
            check_for_updates: false,
            ..Default::default()
        };
        let h = harness(config, FakeLauncher::advertising(json!({})), &[LANGUAGE_SERVER]).await;
        assert!(h.session.wait_negotiated(Duration::from_secs(5)).await);

        h.session.execute(SessionCommand::RestartServer).await.unwrap();
        assert_eq!(h.session.bridge().launch_count(), 2);
        assert_eq!(h.launcher.live_servers(), 1);
    }

    #[tokio::test]
    async fn test_install_command_asks_again_after_decline() {
        let config = ExtensionConfig {
            use_language_server: false,
            ..Default::default()
        };
        let h = harness(config, FakeLauncher::advertising(json!({})), &[]).await;
        h.session.session_state().decline_install("godef");

        h.session.execute(SessionCommand::PromptForInstall).await.unwrap();
        let asked = h.prompter.asked.lock().clone();
        assert!(asked.iter().any(|r| matches!(
            r,
            PromptRequest::InstallMissing { tools } if tools.iter().any(|t| t == "godef")
        )));
    }

    #[tokio::test]
    async fn test_restart_command_with_server_disabled_only_informs() {
        let config = ExtensionConfig {
            use_language_server: false,
            ..Default::default()
        };
        let h = harness(config, FakeLauncher::advertising(json!({})), &[]).await;

        h.session.execute(SessionCommand::RestartServer).await.unwrap();
        assert_eq!(h.session.bridge().launch_count(), 0);
        assert!(h
            .prompter
            .shown
            .lock()
            .iter()
            .any(|m| m.level == MessageLevel::Info));
    }
}
