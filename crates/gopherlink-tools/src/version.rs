//! Language server update checks

use std::path::Path;
use std::sync::Arc;

use gopherlink_process::{ProcessConfig, ToolExecutor};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use tracing::{debug, info};

use crate::catalog::get_tool;
use crate::error::Result;
use crate::registry::VersionRegistry;

static VERSION_CORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").unwrap());

/// Version the binary reports for itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledVersion {
    /// A released version, as printed after the `@`
    Release(String),
    /// Built from a local checkout
    Devel,
}

/// Extract the module version from `<binary> version` output.
///
/// Expected shape is exactly two lines, the second being
/// `<module-path>@<version> <checksum>`. Anything else yields None.
pub fn parse_version_output(stdout: &str) -> Option<InstalledVersion> {
    let lines: Vec<&str> = stdout.trim().split('\n').collect();
    if lines.len() != 2 {
        return None;
    }
    let module_version = lines[1].split_whitespace().next()?;
    let (_, version) = module_version.split_once('@')?;
    if version == "(devel)" {
        return Some(InstalledVersion::Devel);
    }
    Some(InstalledVersion::Release(version.to_string()))
}

/// Loose semver coercion: the first `major[.minor[.patch]]` run, missing parts zeroed.
///
/// Pre-release and build suffixes are dropped, so `v0.2.0-pre.1` coerces to `0.2.0`.
pub fn coerce_version(raw: &str) -> Option<Version> {
    let caps = VERSION_CORE.captures(raw)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Decides whether to offer an update of an auto-updatable tool
pub struct VersionGate {
    executor: Arc<dyn ToolExecutor>,
    registry: Arc<dyn VersionRegistry>,
}

impl VersionGate {
    pub fn new(executor: Arc<dyn ToolExecutor>, registry: Arc<dyn VersionRegistry>) -> Self {
        Self { executor, registry }
    }

    /// Whether `tool` at `installed` is older than the newest published release.
    ///
    /// A binary that cannot report its version is assumed outdated. Registry
    /// failures are returned to the caller, which skips the check.
    pub async fn should_update(&self, tool: &str, installed: &Path) -> Result<bool> {
        let descriptor = match get_tool(tool) {
            Some(d) if d.auto_update => d,
            _ => return Ok(false),
        };
        let Some(module) = descriptor.import_path else {
            return Ok(false);
        };

        let config = ProcessConfig::for_path(installed).args(["version"]);
        let output = match self.executor.execute(config, None).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                debug!(tool = %tool, code = ?output.status_code, "Version subcommand failed");
                return Ok(true);
            }
            Err(e) => {
                debug!(tool = %tool, error = %e, "Could not run version subcommand");
                return Ok(true);
            }
        };

        let installed_version = match parse_version_output(&output.stdout) {
            Some(InstalledVersion::Release(v)) => v,
            Some(InstalledVersion::Devel) | None => return Ok(false),
        };
        let Some(current) = coerce_version(&installed_version) else {
            return Ok(false);
        };

        let mut published: Vec<Version> = self
            .registry
            .list_versions(module)
            .await?
            .iter()
            .filter_map(|v| coerce_version(v))
            .collect();
        published.sort_by(|a, b| b.cmp(a));

        let outdated = published.first().is_some_and(|latest| current < *latest);
        if outdated {
            info!(tool = %tool, installed = %current, latest = %published[0], "Update available");
        }
        Ok(outdated)
    }

    /// Newest published version of `tool`, if any
    pub async fn latest_version(&self, tool: &str) -> Result<Option<Version>> {
        let Some(module) = get_tool(tool).and_then(|d| d.import_path) else {
            return Ok(None);
        };
        Ok(self
            .registry
            .list_versions(module)
            .await?
            .iter()
            .filter_map(|v| coerce_version(v))
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ToolsError};
    use async_trait::async_trait;
    use gopherlink_process::{CancellationToken, ExecOutput, ProcessError};
    use parking_lot::Mutex;
    use std::path::PathBuf;

    struct FakeBinary {
        result: Mutex<Option<std::result::Result<ExecOutput, ProcessError>>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeBinary {
        fn prints(stdout: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(Ok(ExecOutput {
                    status_code: Some(0),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }))),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn exits(code: i32) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(Ok(ExecOutput {
                    status_code: Some(code),
                    stdout: String::new(),
                    stderr: "flag provided but not defined: -version".to_string(),
                }))),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolExecutor for FakeBinary {
        async fn execute(
            &self,
            config: ProcessConfig,
            _cancel: Option<CancellationToken>,
        ) -> gopherlink_process::Result<ExecOutput> {
            self.calls.lock().push(config.args.clone());
            self.result.lock().take().unwrap_or_else(|| Ok(ExecOutput::default()))
        }
    }

    struct FixedRegistry(std::result::Result<Vec<&'static str>, &'static str>);

    #[async_trait]
    impl VersionRegistry for FixedRegistry {
        async fn list_versions(&self, _module: &str) -> Result<Vec<String>> {
            match &self.0 {
                Ok(list) => Ok(list.iter().map(|s| s.to_string()).collect()),
                Err(msg) => Err(ToolsError::registry(*msg)),
            }
        }
    }

    fn gate(binary: Arc<FakeBinary>, versions: Vec<&'static str>) -> VersionGate {
        VersionGate::new(binary, Arc::new(FixedRegistry(Ok(versions))))
    }

    const V012: &str = "golang.org/x/tools/gopls v0.1.2\n    golang.org/x/tools/gopls@v0.1.2 h1:abc=\n";

    #[tokio::test]
    async fn test_older_release_needs_update() {
        let binary = FakeBinary::prints(V012);
        let gate = gate(binary.clone(), vec!["v0.1.3", "v0.1.1", "v0.0.9"]);

        assert!(gate.should_update("gopls", &PathBuf::from("/bin/gopls")).await.unwrap());
        assert_eq!(binary.calls.lock()[0], vec!["version"]);
    }

    #[tokio::test]
    async fn test_latest_release_needs_nothing() {
        let gate = gate(FakeBinary::prints(V012), vec!["v0.1.0", "v0.1.2"]);
        assert!(!gate.should_update("gopls", Path::new("/bin/gopls")).await.unwrap());
    }

    #[tokio::test]
    async fn test_devel_build_is_left_alone() {
        let out = "golang.org/x/tools/gopls master\n    golang.org/x/tools/gopls@(devel)\n";
        let gate = gate(FakeBinary::prints(out), vec!["v9.9.9"]);
        assert!(!gate.should_update("gopls", Path::new("/bin/gopls")).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_line_output_is_left_alone() {
        let gate = gate(FakeBinary::prints("gopls v0.1.2\n"), vec!["v9.9.9"]);
        assert!(!gate.should_update("gopls", Path::new("/bin/gopls")).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_version_subcommand_recommends_update() {
        let gate = gate(FakeBinary::exits(2), vec!["v0.1.3"]);
        assert!(gate.should_update("gopls", Path::new("/bin/gopls")).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_tools_never_update() {
        let binary = FakeBinary::prints(V012);
        let gate = gate(binary.clone(), vec!["v9.9.9"]);
        assert!(!gate.should_update("gocode", Path::new("/bin/gocode")).await.unwrap());
        assert!(binary.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let gate = VersionGate::new(
            FakeBinary::prints(V012),
            Arc::new(FixedRegistry(Err("offline"))),
        );
        let err = gate
            .should_update("gopls", Path::new("/bin/gopls"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            parse_version_output(V012),
            Some(InstalledVersion::Release("v0.1.2".to_string()))
        );
        assert_eq!(parse_version_output(""), None);
        assert_eq!(parse_version_output("a\nb\nc"), None);
        assert_eq!(parse_version_output("gopls\n    golang.org/x/tools/gopls"), None);
    }

    #[test]
    fn test_coerce_version() {
        assert_eq!(coerce_version("v0.1.2"), Some(Version::new(0, 1, 2)));
        assert_eq!(coerce_version("v0.2.0-pre.1"), Some(Version::new(0, 2, 0)));
        assert_eq!(coerce_version("v1"), Some(Version::new(1, 0, 0)));
        assert_eq!(coerce_version("latest"), None);
    }
}
