//! Fakes shared by the end-to-end tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gopherlink_config::ExtensionConfig;
use gopherlink_lsp::{
    BridgeError, InMemoryProviderRegistry, LanguageClient, ServerCapabilities, ServerLaunch,
    ServerLauncher, ServerNotification, Session, SessionDeps,
};
use gopherlink_process::{CancellationToken, ExecOutput, ProcessConfig, ProcessError, ToolExecutor};
use gopherlink_tools::{PromptChoice, PromptRequest, Prompter, ToolResolver, UserMessage};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// A language server that advertises fixed capabilities and records traffic
pub struct FakeServer {
    pub capabilities: Value,
    pub running: AtomicBool,
    pub forwarded: Mutex<Vec<String>>,
    pub notifications: broadcast::Sender<ServerNotification>,
}

#[async_trait]
impl LanguageClient for FakeServer {
    async fn initialize(&self, _root: Option<&Path>) -> gopherlink_lsp::Result<ServerCapabilities> {
        Ok(ServerCapabilities::from_initialize_result(
            &json!({ "capabilities": self.capabilities }),
        ))
    }

    async fn request(&self, method: &str, _params: Value) -> gopherlink_lsp::Result<Value> {
        self.forwarded.lock().push(method.to_string());
        Ok(json!({ "answeredBy": "gopls" }))
    }

    fn notify(&self, _method: &str, _params: Value) -> gopherlink_lsp::Result<()> {
        Ok(())
    }

    fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification> {
        self.notifications.subscribe()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> gopherlink_lsp::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeLauncher {
    pub capabilities: Value,
    pub delay: Duration,
    pub servers: Mutex<Vec<Arc<FakeServer>>>,
}

impl FakeLauncher {
    pub fn new(capabilities: Value) -> Self {
        Self {
            capabilities,
            delay: Duration::ZERO,
            servers: Mutex::new(Vec::new()),
        }
    }

    pub fn running(&self) -> usize {
        self.servers
            .lock()
            .iter()
            .filter(|s| s.running.load(Ordering::SeqCst))
            .count()
    }

    pub fn forwarded(&self) -> Vec<String> {
        self.servers
            .lock()
            .iter()
            .flat_map(|s| s.forwarded.lock().clone())
            .collect()
    }
}

#[async_trait]
impl ServerLauncher for FakeLauncher {
    async fn launch(&self, _launch: &ServerLaunch) -> gopherlink_lsp::Result<Arc<dyn LanguageClient>> {
        tokio::time::sleep(self.delay).await;
        let server = Arc::new(FakeServer {
            capabilities: self.capabilities.clone(),
            running: AtomicBool::new(true),
            forwarded: Mutex::new(Vec::new()),
            notifications: broadcast::channel(16).0,
        });
        self.servers.lock().push(server.clone());
        Ok(server)
    }
}

/// Answers every prompt the same way and records what was asked
#[derive(Default)]
pub struct ScriptedPrompter {
    pub answer: Option<PromptChoice>,
    pub asked: Mutex<Vec<PromptRequest>>,
    pub shown: Mutex<Vec<UserMessage>>,
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, request: PromptRequest) -> Option<PromptChoice> {
        self.asked.lock().push(request);
        self.answer
    }

    async fn show(&self, message: UserMessage) {
        self.shown.lock().push(message);
    }
}

type Script = Box<dyn Fn(&ProcessConfig) -> (Duration, ExecOutput) + Send + Sync>;

/// Runs no processes; each call is answered by a script after a delay
pub struct ScriptedExecutor {
    script: Script,
    pub calls: Mutex<Vec<ProcessConfig>>,
}

impl ScriptedExecutor {
    pub fn new(
        script: impl Fn(&ProcessConfig) -> (Duration, ExecOutput) + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with empty output
    pub fn quiet() -> Self {
        Self::new(|_| (Duration::ZERO, ok("")))
    }
}

#[async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        config: ProcessConfig,
        cancel: Option<CancellationToken>,
    ) -> Result<ExecOutput, ProcessError> {
        let (delay, output) = (self.script)(&config);
        let command = config.command.clone();
        self.calls.lock().push(config);
        let token = cancel.unwrap_or_default();
        tokio::select! {
            _ = token.cancelled() => Err(ProcessError::Cancelled { command }),
            _ = tokio::time::sleep(delay) => Ok(output),
        }
    }
}

pub fn ok(stdout: &str) -> ExecOutput {
    ExecOutput {
        status_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(stderr: &str) -> ExecOutput {
    ExecOutput {
        status_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// A workspace directory with empty stand-ins for `tools` in its `bin`
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn with_tools(tools: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        for tool in tools {
            let name = format!("{}{}", tool, std::env::consts::EXE_SUFFIX);
            std::fs::write(dir.path().join("bin").join(name), "").unwrap();
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    pub fn resolver(&self) -> ToolResolver {
        ToolResolver::new(HashMap::new(), vec![self.dir.path().join("bin")]).with_path_env("")
    }

    pub fn config(&self) -> ExtensionConfig {
        ExtensionConfig {
            gopath: Some(self.dir.path().to_string_lossy().into_owned()),
            check_for_updates: false,
            ..Default::default()
        }
    }

    pub async fn activate(
        &self,
        config: ExtensionConfig,
        launcher: Arc<FakeLauncher>,
        executor: Arc<ScriptedExecutor>,
        prompter: Arc<ScriptedPrompter>,
        registry: Arc<InMemoryProviderRegistry>,
    ) -> Result<Arc<Session>, BridgeError> {
        let deps = SessionDeps::new(prompter)
            .with_launcher(launcher)
            .with_executor(executor)
            .with_registry(registry)
            .with_resolver(self.resolver())
            .without_activation_offers();
        Session::activate(config, self.root(), deps).await
    }
}
