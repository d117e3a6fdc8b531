//! Tool installation and the prompts that lead to it

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use gopherlink_config::{ConfigError, ExtensionConfig};
use gopherlink_process::{ProcessConfig, ToolExecutor};
use tracing::{debug, info, warn};

use crate::catalog::{get_tool, important_tools, ToolDescriptor};
use crate::error::{Result, ToolsError};
use crate::prompt::{PromptChoice, PromptRequest, Prompter, UserMessage};
use crate::resolver::ToolResolver;
use crate::session::SessionState;
use crate::version::VersionGate;

/// One tool that failed to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFailure {
    pub tool: String,
    pub reason: String,
}

/// Outcome of a batch install; every tool is attempted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<InstallFailure>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Message summarizing the batch for the user
    pub fn to_message(&self) -> UserMessage {
        if self.failed.is_empty() {
            return UserMessage::info(format!(
                "Installed {}",
                self.succeeded.join(", ")
            ));
        }
        let failed: Vec<String> = self
            .failed
            .iter()
            .map(|f| format!("{} ({})", f.tool, f.reason))
            .collect();
        UserMessage::error(format!(
            "{} tool(s) failed to install: {}",
            self.failed.len(),
            failed.join("; ")
        ))
    }
}

/// What came of a prompt flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The user accepted and the install ran
    Installed(InstallReport),
    /// The user declined; the decline is remembered for the session
    Declined,
    /// The prompt was dismissed without an answer
    Dismissed,
    /// No prompt was shown
    Skipped,
}

/// Installs tools with the Go toolchain
pub struct ToolInstaller {
    executor: Arc<dyn ToolExecutor>,
    resolver: ToolResolver,
    install_gopath: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl ToolInstaller {
    pub fn new(
        executor: Arc<dyn ToolExecutor>,
        resolver: ToolResolver,
        config: &ExtensionConfig,
    ) -> Self {
        let mut env = HashMap::new();
        if let Some(proxy) = config.http_proxy.as_deref().filter(|p| !p.is_empty()) {
            env.insert("HTTP_PROXY".to_string(), proxy.to_string());
            env.insert("HTTPS_PROXY".to_string(), proxy.to_string());
        }
        Self {
            executor,
            resolver,
            install_gopath: config.tools_install_gopath().ok(),
            env,
        }
    }

    pub fn resolver(&self) -> &ToolResolver {
        &self.resolver
    }

    /// Install a single tool into the tools GOPATH
    pub async fn install_tool(&self, tool: &ToolDescriptor) -> Result<()> {
        let import_path = tool.import_path.ok_or_else(|| {
            ToolsError::tool_error(tool.name, "ships with Go and cannot be installed separately")
        })?;
        let go = self.resolver.resolve("go")?;

        let mut base = ProcessConfig::for_path(&go).envs(&self.env);
        if let Some(gopath) = &self.install_gopath {
            base = base.env("GOPATH", gopath.to_string_lossy());
        }

        let steps = match tool.module_variant_of {
            // variants share a binary name with the original, so build under our own name
            Some(_) => {
                let gopath = self.install_gopath.as_ref().ok_or_else(|| {
                    ToolsError::Config(ConfigError::MissingSetting {
                        key: "tools_gopath".to_string(),
                        message: format!("{} needs a GOPATH to be built in", tool.name),
                    })
                })?;
                let output = gopath.join("bin").join(tool.binary_name());
                vec![
                    base.clone()
                        .env("GO111MODULE", "off")
                        .args(["get", "-d", import_path]),
                    base.env("GO111MODULE", "off").args([
                        "build".to_string(),
                        "-o".to_string(),
                        output.to_string_lossy().into_owned(),
                        import_path.to_string(),
                    ]),
                ]
            }
            None => {
                let mut install = base.env("GO111MODULE", "on");
                if let Some(gopath) = &self.install_gopath {
                    install = install.env("GOBIN", gopath.join("bin").to_string_lossy());
                }
                vec![install.args(["install".to_string(), format!("{}@latest", import_path)])]
            }
        };

        for step in steps {
            debug!(tool = %tool.name, command = %step.display(), "Install step");
            let output = self
                .executor
                .execute(step, None)
                .await
                .map_err(|e| ToolsError::from_process("go", e))?;
            if !output.success() {
                let stderr = output.stderr.trim();
                return Err(ToolsError::tool_error(
                    tool.name,
                    if stderr.is_empty() {
                        format!("go exited with {:?}", output.status_code)
                    } else {
                        stderr.to_string()
                    },
                ));
            }
        }

        info!(tool = %tool.name, "Installed tool");
        Ok(())
    }

    /// Install tools one after another; one failure never stops the rest
    pub async fn install_tools(&self, tools: &[&ToolDescriptor]) -> InstallReport {
        let mut report = InstallReport::default();
        for tool in tools {
            match self.install_tool(tool).await {
                Ok(()) => report.succeeded.push(tool.name.to_string()),
                Err(e) => {
                    warn!(tool = %tool.name, error = %e, "Tool install failed");
                    report.failed.push(InstallFailure {
                        tool: tool.name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Offer to install a tool found missing at use time.
    ///
    /// Asked at most once per tool per session, and never for a tool the user
    /// already declined.
    pub async fn prompt_for_missing_tool(
        &self,
        tool: &str,
        session: &SessionState,
        prompter: &dyn Prompter,
    ) -> PromptOutcome {
        if session.is_install_declined(tool) || !session.mark_install_offered(tool) {
            return PromptOutcome::Skipped;
        }

        let Some(descriptor) = get_tool(tool).filter(|d| d.is_installable()) else {
            prompter
                .show(UserMessage::error(format!(
                    "The \"{}\" command is not available and cannot be installed automatically.",
                    tool
                )))
                .await;
            return PromptOutcome::Skipped;
        };

        let request = PromptRequest::InstallMissing {
            tools: vec![tool.to_string()],
        };
        self.confirm_and_install(request, &[descriptor], session, prompter)
            .await
    }

    /// Offer every missing important tool in one prompt, once per session
    pub async fn offer_missing_important_tools(
        &self,
        module_mode: bool,
        session: &SessionState,
        prompter: &dyn Prompter,
    ) -> PromptOutcome {
        let missing: Vec<&ToolDescriptor> = self
            .resolver
            .missing(important_tools(module_mode))
            .into_iter()
            .filter(|t| !session.is_install_declined(t.name))
            .collect();

        if missing.is_empty() || !session.mark_important_offered() {
            return PromptOutcome::Skipped;
        }
        for tool in &missing {
            session.mark_install_offered(tool.name);
        }

        let request = PromptRequest::InstallMissing {
            tools: missing.iter().map(|t| t.name.to_string()).collect(),
        };
        self.confirm_and_install(request, &missing, session, prompter)
            .await
    }

    /// Offer every missing important tool on explicit request.
    ///
    /// Ignores earlier offers and declines; a new decline is still recorded.
    pub async fn prompt_for_install(
        &self,
        module_mode: bool,
        session: &SessionState,
        prompter: &dyn Prompter,
    ) -> PromptOutcome {
        let missing = self.resolver.missing(important_tools(module_mode));
        if missing.is_empty() {
            prompter
                .show(UserMessage::info("All important Go tools are installed."))
                .await;
            return PromptOutcome::Skipped;
        }
        let request = PromptRequest::InstallMissing {
            tools: missing.iter().map(|t| t.name.to_string()).collect(),
        };
        self.confirm_and_install(request, &missing, session, prompter)
            .await
    }

    /// Offer an update of `tool` when the gate finds it outdated
    pub async fn prompt_for_update(
        &self,
        tool: &str,
        gate: &VersionGate,
        session: &SessionState,
        prompter: &dyn Prompter,
    ) -> PromptOutcome {
        if session.is_update_declined(tool) {
            return PromptOutcome::Skipped;
        }
        self.update_flow(tool, gate, session, prompter).await
    }

    /// Check for an update on explicit request, even after a decline
    pub async fn prompt_for_update_now(
        &self,
        tool: &str,
        gate: &VersionGate,
        session: &SessionState,
        prompter: &dyn Prompter,
    ) -> PromptOutcome {
        let outcome = self.update_flow(tool, gate, session, prompter).await;
        if outcome == PromptOutcome::Skipped {
            prompter
                .show(UserMessage::info(format!("{} is up to date.", tool)))
                .await;
        }
        outcome
    }

    async fn update_flow(
        &self,
        tool: &str,
        gate: &VersionGate,
        session: &SessionState,
        prompter: &dyn Prompter,
    ) -> PromptOutcome {
        let Some(descriptor) = get_tool(tool) else {
            return PromptOutcome::Skipped;
        };
        let Ok(path) = self.resolver.resolve(tool) else {
            return PromptOutcome::Skipped;
        };

        match gate.should_update(tool, &path).await {
            Ok(true) => {}
            Ok(false) => return PromptOutcome::Skipped,
            Err(e) => {
                warn!(tool = %tool, error = %e, "Update check skipped");
                return PromptOutcome::Skipped;
            }
        }

        let request = PromptRequest::UpdateTool {
            tool: tool.to_string(),
            latest: gate
                .latest_version(tool)
                .await
                .ok()
                .flatten()
                .map(|v| v.to_string()),
        };
        match prompter.confirm(request).await {
            Some(PromptChoice::Accept) => {
                let report = self.install_tools(&[descriptor]).await;
                prompter.show(report.to_message()).await;
                PromptOutcome::Installed(report)
            }
            Some(PromptChoice::Decline) => {
                session.decline_update(tool);
                PromptOutcome::Declined
            }
            None => PromptOutcome::Dismissed,
        }
    }

    async fn confirm_and_install(
        &self,
        request: PromptRequest,
        tools: &[&ToolDescriptor],
        session: &SessionState,
        prompter: &dyn Prompter,
    ) -> PromptOutcome {
        match prompter.confirm(request).await {
            Some(PromptChoice::Accept) => {
                let report = self.install_tools(tools).await;
                prompter.show(report.to_message()).await;
                PromptOutcome::Installed(report)
            }
            Some(PromptChoice::Decline) => {
                for tool in tools {
                    session.decline_install(tool.name);
                }
                PromptOutcome::Declined
            }
            None => PromptOutcome::Dismissed,
        }
    }
}
