//! Core configuration types

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::features::FeatureToggleSet;

/// Complete configuration surface read by the negotiation core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Launch the language server instead of relying on fallback tools only
    pub use_language_server: bool,
    /// Extra flags passed to the language server
    pub language_server_flags: Vec<String>,
    /// Extra environment for the language server process
    pub language_server_env: HashMap<String, String>,
    /// How long requests wait for the server to become ready
    pub startup_timeout_ms: u64,
    /// Per-feature enable flags
    pub features: FeatureToggleSet,
    /// Logical tool name -> replacement binary name or path
    pub alternate_tools: HashMap<String, String>,
    /// GOPATH override; falls back to the GOPATH environment variable
    pub gopath: Option<String>,
    /// Separate GOPATH used for installing tools
    pub tools_gopath: Option<String>,
    /// Per-tool flag arrays
    pub tool_flags: ToolFlags,
    /// Linter used for save-time diagnostics
    pub lint_tool: String,
    /// Formatter used by the formatting fallback
    pub format_tool: String,
    /// Change-triggered diagnostics
    pub live_errors: LiveErrorsConfig,
    /// Proxy injected into remote registry fetches
    pub http_proxy: Option<String>,
    /// Query the module registry for newer language server versions
    pub check_for_updates: bool,
}

/// Flags appended to each tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolFlags {
    pub lint: Vec<String>,
    pub vet: Vec<String>,
    pub build: Vec<String>,
    pub format: Vec<String>,
}

/// Live (on change) diagnostics settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveErrorsConfig {
    pub enabled: bool,
    /// Quiet period after the last change before the checker runs
    pub delay_ms: u64,
}

impl Default for LiveErrorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: 500,
        }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            use_language_server: true,
            language_server_flags: Vec::new(),
            language_server_env: HashMap::new(),
            startup_timeout_ms: 10_000,
            features: FeatureToggleSet::default(),
            alternate_tools: HashMap::new(),
            gopath: None,
            tools_gopath: None,
            tool_flags: ToolFlags::default(),
            lint_tool: "golint".to_string(),
            format_tool: "goreturns".to_string(),
            live_errors: LiveErrorsConfig::default(),
            http_proxy: None,
            check_for_updates: true,
        }
    }
}

impl ExtensionConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> Result<()> {
        if self.startup_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "startup_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.lint_tool.trim().is_empty() {
            return Err(ConfigError::Validation(
                "lint_tool must name a linter".to_string(),
            ));
        }
        if self.format_tool.trim().is_empty() {
            return Err(ConfigError::Validation(
                "format_tool must name a formatter".to_string(),
            ));
        }
        if let Some(proxy) = &self.http_proxy {
            if !proxy.contains("://") {
                return Err(ConfigError::Validation(format!(
                    "http_proxy '{}' is not a URL",
                    proxy
                )));
            }
        }
        Ok(())
    }

    /// Whether moving from `old` to `new` changes how providers were negotiated.
    ///
    /// Provider registrations are not revocable mid-session, so such changes are
    /// surfaced as a reload prompt rather than applied in place.
    pub fn requires_reload(old: &ExtensionConfig, new: &ExtensionConfig) -> bool {
        old.use_language_server != new.use_language_server
            || old.language_server_flags != new.language_server_flags
            || old.language_server_env != new.language_server_env
            || old.features != new.features
            || old.alternate_tools != new.alternate_tools
    }

    /// GOPATH entries, from configuration first and the environment second
    pub fn gopath_entries(&self) -> Result<Vec<PathBuf>> {
        let raw = match &self.gopath {
            Some(gopath) if !gopath.trim().is_empty() => gopath.clone(),
            _ => std::env::var("GOPATH").unwrap_or_default(),
        };
        let entries: Vec<PathBuf> = std::env::split_paths(&raw)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| expand_home(&p.to_string_lossy()))
            .collect();
        if entries.is_empty() {
            return Err(ConfigError::MissingSetting {
                key: "gopath".to_string(),
                message: "GOPATH is not set; set it in the environment or in the gopath setting"
                    .to_string(),
            });
        }
        Ok(entries)
    }

    /// GOPATH tools are installed into
    pub fn tools_install_gopath(&self) -> Result<PathBuf> {
        if let Some(tools) = self.tools_gopath.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(expand_home(tools));
        }
        self.gopath_entries()?
            .into_iter()
            .next()
            .ok_or_else(|| ConfigError::MissingSetting {
                key: "tools_gopath".to_string(),
                message: "No GOPATH available to install tools into".to_string(),
            })
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
