//! Installing tools and deciding on gopls updates without a network

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{failed, ok, ScriptedExecutor, Workspace};
use gopherlink_tools::{get_tool, ToolInstaller, VersionGate, VersionRegistry};

struct FixedVersions(Vec<&'static str>);

#[async_trait]
impl VersionRegistry for FixedVersions {
    async fn list_versions(&self, _module: &str) -> gopherlink_tools::Result<Vec<String>> {
        Ok(self.0.iter().map(|v| v.to_string()).collect())
    }
}

fn gate(stdout: &'static str, published: Vec<&'static str>) -> VersionGate {
    let executor = Arc::new(ScriptedExecutor::new(move |_| (Duration::ZERO, ok(stdout))));
    VersionGate::new(executor, Arc::new(FixedVersions(published)))
}

#[tokio::test]
async fn one_failed_install_does_not_stop_the_rest() {
    let ws = Workspace::with_tools(&["go"]);
    let executor = Arc::new(ScriptedExecutor::new(|call| {
        if call
            .args
            .iter()
            .any(|a| a == "golang.org/x/tools/cmd/guru@latest")
        {
            (Duration::ZERO, failed("cannot find module providing package"))
        } else {
            (Duration::ZERO, ok(""))
        }
    }));
    let installer = ToolInstaller::new(executor.clone(), ws.resolver(), &ws.config());

    let tools: Vec<_> = ["godef", "guru", "gorename"]
        .iter()
        .filter_map(|name| get_tool(name))
        .collect();
    let report = installer.install_tools(&tools).await;

    assert_eq!(report.succeeded, vec!["godef".to_string(), "gorename".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].tool, "guru");
    assert!(report.failed[0].reason.contains("cannot find module"));
    assert!(!report.is_complete());

    let calls = executor.calls.lock();
    assert_eq!(calls.len(), 3);
    let gobin = ws.root().join("bin").to_string_lossy().into_owned();
    assert!(calls
        .iter()
        .all(|c| c.env.get("GOBIN") == Some(&gobin) && c.args[0] == "install"));
}

#[tokio::test]
async fn older_release_is_offered_an_update() {
    let gate = gate(
        "golang.org/x/tools/gopls v0.1.2\n    golang.org/x/tools/gopls@v0.1.2 h1:abc=\n",
        vec!["v0.1.3", "v0.1.1", "v0.0.9"],
    );
    assert!(gate.should_update("gopls", "/go/bin/gopls".as_ref()).await.unwrap());
}

#[tokio::test]
async fn development_build_is_never_updated() {
    let gate = gate(
        "golang.org/x/tools/gopls (devel)\n    golang.org/x/tools/gopls@(devel)\n",
        vec!["v9.9.9"],
    );
    assert!(!gate.should_update("gopls", "/go/bin/gopls".as_ref()).await.unwrap());
}

#[tokio::test]
async fn unexpected_version_output_is_not_updated() {
    let gate = gate("golang.org/x/tools/gopls v0.1.2\n", vec!["v0.1.3"]);
    assert!(!gate.should_update("gopls", "/go/bin/gopls".as_ref()).await.unwrap());
}
