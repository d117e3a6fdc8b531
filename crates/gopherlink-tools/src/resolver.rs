//! Logical tool name to executable path

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use gopherlink_config::{expand_home, ExtensionConfig};
use tracing::{debug, warn};

use crate::catalog::ToolDescriptor;
use crate::error::{Result, ToolsError};

/// Finds tool executables.
///
/// Lookup order: the `alternate_tools` override, then GOBIN, each GOPATH
/// `bin` directory, the tools GOPATH `bin` directory, then PATH.
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    overrides: HashMap<String, String>,
    search_dirs: Vec<PathBuf>,
    path_env: Option<OsString>,
}

impl ToolResolver {
    pub fn new(overrides: HashMap<String, String>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            overrides,
            search_dirs,
            path_env: None,
        }
    }

    /// Build the search path from configuration and the environment
    pub fn from_config(config: &ExtensionConfig) -> Self {
        let mut dirs = Vec::new();

        if let Some(gobin) = std::env::var_os("GOBIN").filter(|v| !v.is_empty()) {
            dirs.push(PathBuf::from(gobin));
        }

        match config.gopath_entries() {
            Ok(entries) => dirs.extend(entries.into_iter().map(|p| p.join("bin"))),
            Err(e) => debug!(error = %e, "No GOPATH configured, relying on PATH"),
        }

        if let Some(tools) = config.tools_gopath.as_deref().filter(|s| !s.is_empty()) {
            dirs.push(expand_home(tools).join("bin"));
        }

        dirs.dedup();
        Self::new(config.alternate_tools.clone(), dirs)
    }

    /// Use this PATH value instead of the process environment
    pub fn with_path_env(mut self, path: impl Into<OsString>) -> Self {
        self.path_env = Some(path.into());
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Resolve `tool` to an executable, or fail with a missing tool error
    pub fn resolve(&self, tool: &str) -> Result<PathBuf> {
        let name = match self.overrides.get(tool) {
            Some(alternate) => {
                let expanded = expand_home(alternate);
                if expanded.is_absolute() {
                    if expanded.is_file() {
                        debug!(tool = %tool, path = ?expanded, "Using alternate tool path");
                        return Ok(expanded);
                    }
                    warn!(tool = %tool, path = ?expanded, "Alternate tool path does not exist");
                    return Err(ToolsError::missing_tool(tool));
                }
                alternate.as_str()
            }
            None => tool,
        };

        let binary = format!("{}{}", name, std::env::consts::EXE_SUFFIX);
        if let Some(found) = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(&binary))
            .find(|candidate| candidate.is_file())
        {
            debug!(tool = %tool, path = ?found, "Resolved tool");
            return Ok(found);
        }

        let on_path = match &self.path_env {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_default();
                which::which_in(name, Some(paths), cwd)
            }
            None => which::which(name),
        };

        on_path.map_err(|_| {
            debug!(tool = %tool, "Tool not found");
            ToolsError::missing_tool(tool)
        })
    }

    pub fn is_available(&self, tool: &str) -> bool {
        self.resolve(tool).is_ok()
    }

    /// The subset of `tools` that cannot be resolved
    pub fn missing<'a>(
        &self,
        tools: impl IntoIterator<Item = &'a ToolDescriptor>,
    ) -> Vec<&'a ToolDescriptor> {
        tools
            .into_iter()
            .filter(|t| !self.is_available(t.name))
            .collect()
    }
}

/// Whether `dir` or one of its ancestors holds a `go.mod`
pub fn is_module_workspace(dir: &Path) -> bool {
    dir.ancestors().any(|d| d.join("go.mod").is_file())
}
