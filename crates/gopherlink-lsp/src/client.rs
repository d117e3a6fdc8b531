//! Language server client over stdio

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gopherlink_config::ExtensionConfig;
use gopherlink_process::{ManagedChild, ProcessConfig, ProcessError, ProcessManager};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capabilities::{initialize_params, ServerCapabilities};
use crate::connection::LspConnection;
use crate::error::{BridgeError, Result};
use crate::protocol::ServerNotification;
use crate::transport::{read_message, write_message};

/// How long shutdown waits for the server to exit by itself
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// A connection to a running language server
#[async_trait]
pub trait LanguageClient: Send + Sync {
    /// Run the `initialize` handshake and return what the server advertised
    async fn initialize(&self, root: Option<&Path>) -> Result<ServerCapabilities>;

    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    fn notify(&self, method: &str, params: Value) -> Result<()>;

    /// Notifications the server pushes, such as published diagnostics
    fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification>;

    /// Whether a pushed notification should reach the editor
    fn admits_notification(&self, _notification: &ServerNotification) -> bool {
        true
    }

    fn is_running(&self) -> bool;

    /// Stop the server; safe to call more than once
    async fn shutdown(&self) -> Result<()>;
}

/// Everything needed to start the language server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLaunch {
    /// Logical tool name, e.g. `gopls`
    pub tool: String,
    pub path: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub root: Option<PathBuf>,
}

impl ServerLaunch {
    pub fn new(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            path: path.into(),
            args: Vec::new(),
            env: HashMap::new(),
            root: None,
        }
    }

    /// Launch with the configured flags and environment
    pub fn from_config(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        config: &ExtensionConfig,
        root: Option<&Path>,
    ) -> Self {
        let mut launch = Self::new(tool, path);
        launch.args = config.language_server_flags.clone();
        launch.env = config.language_server_env.clone();
        launch.root = root.map(Path::to_path_buf);
        launch
    }

    fn process_config(&self) -> ProcessConfig {
        let mut config = ProcessConfig::for_path(&self.path)
            .args(self.args.clone())
            .envs(&self.env);
        if let Some(root) = &self.root {
            config = config.working_dir(root);
        }
        config
    }
}

/// Starts language servers
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    async fn launch(&self, launch: &ServerLaunch) -> Result<Arc<dyn LanguageClient>>;
}

/// Launches the server as a child process speaking LSP on stdio
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioLauncher {
    manager: ProcessManager,
}

impl StdioLauncher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServerLauncher for StdioLauncher {
    async fn launch(&self, launch: &ServerLaunch) -> Result<Arc<dyn LanguageClient>> {
        let client = StdioLanguageClient::spawn(launch, &self.manager).await?;
        Ok(Arc::new(client))
    }
}

/// Client for a server process, or any pair of byte streams
pub struct StdioLanguageClient {
    name: String,
    connection: Arc<LspConnection>,
    child: tokio::sync::Mutex<Option<ManagedChild>>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    stop_writer: CancellationToken,
    running: Arc<AtomicBool>,
}

impl StdioLanguageClient {
    /// Spawn the server and wire its stdio to a connection
    pub async fn spawn(launch: &ServerLaunch, manager: &ProcessManager) -> Result<Self> {
        info!(server = %launch.tool, path = ?launch.path, "Starting language server");
        let mut child = manager
            .spawn(launch.process_config())
            .await
            .map_err(|e| match e {
                ProcessError::NotFound { .. } => BridgeError::MissingTool {
                    tool: launch.tool.clone(),
                },
                other => BridgeError::ServerStartFailed(other.to_string()),
            })?;

        let stdin = child
            .stdin()
            .ok_or_else(|| BridgeError::ServerStartFailed("no stdin pipe".to_string()))?;
        let stdout = child
            .stdout()
            .ok_or_else(|| BridgeError::ServerStartFailed("no stdout pipe".to_string()))?;
        let stderr = child.stderr();
        debug!(
            server = %launch.tool,
            pid = %child.pid(),
            args = ?child.config().args,
            "Language server spawned"
        );

        let client = Self::connect(&launch.tool, stdout, stdin);
        if let Some(stderr) = stderr {
            client.tasks.lock().push(spawn_stderr_task(&launch.tool, stderr));
        }
        *client.child.lock().await = Some(child);
        Ok(client)
    }

    /// Speak LSP over an arbitrary reader and writer
    pub fn connect<R, W>(name: &str, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let connection = Arc::new(LspConnection::new(outgoing_tx));
        let running = Arc::new(AtomicBool::new(true));
        let stop_writer = CancellationToken::new();

        let writer = spawn_writer_task(name, writer, outgoing_rx, stop_writer.clone());
        let reader = spawn_reader_task(name, reader, connection.clone(), running.clone());

        Self {
            name: name.to_string(),
            connection,
            child: tokio::sync::Mutex::new(None),
            writer: tokio::sync::Mutex::new(Some(writer)),
            tasks: parking_lot::Mutex::new(vec![reader]),
            stop_writer,
            running,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Drains queued bodies into the server; on `stop` flushes what is already queued
fn spawn_writer_task<W>(
    name: &str,
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
    stop: CancellationToken,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        loop {
            let body = tokio::select! {
                biased;
                body = rx.recv() => match body {
                    Some(body) => body,
                    None => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(body) = rx.try_recv() {
                        if write_message(&mut writer, &body).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            };
            if let Err(e) = write_message(&mut writer, &body).await {
                warn!(server = %name, error = %e, "Failed to write to language server");
                break;
            }
        }
        debug!(server = %name, "Writer task finished");
    })
}

fn spawn_reader_task<R>(
    name: &str,
    reader: R,
    connection: Arc<LspConnection>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let reason = loop {
            match read_message(&mut reader).await {
                Ok(Some(body)) => {
                    if let Err(e) = connection.handle_incoming(&body) {
                        warn!(server = %name, error = %e, "Dropped message from language server");
                    }
                }
                Ok(None) => break "language server exited".to_string(),
                Err(e) => break format!("read failed: {}", e),
            }
        };
        running.store(false, Ordering::SeqCst);
        connection.close(&reason);
        debug!(server = %name, reason = %reason, "Reader task finished");
    })
}

fn spawn_stderr_task<R>(name: &str, stderr: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.trim().is_empty() {
                warn!(server = %name, "{}", line);
            }
        }
    })
}

#[async_trait]
impl LanguageClient for StdioLanguageClient {
    async fn initialize(&self, root: Option<&Path>) -> Result<ServerCapabilities> {
        let params = initialize_params(Some(std::process::id()), root);
        let result = self.connection.request("initialize", Some(params)).await?;
        let capabilities = ServerCapabilities::from_initialize_result(&result);
        self.connection.notify("initialized", Some(json!({})))?;
        info!(
            server = %self.name,
            features = capabilities.supported_features().len(),
            "Language server initialized"
        );
        Ok(capabilities)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }
        self.connection.request(method, Some(params)).await
    }

    fn notify(&self, method: &str, params: Value) -> Result<()> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }
        self.connection.notify(method, Some(params))
    }

    fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification> {
        self.connection.subscribe()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<()> {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!(server = %self.name, "Sending shutdown");
            match tokio::time::timeout(EXIT_GRACE, self.connection.request("shutdown", None)).await {
                Ok(Ok(_)) => {
                    let _ = self.connection.notify("exit", None);
                }
                Ok(Err(e)) => warn!(server = %self.name, error = %e, "Shutdown request failed"),
                Err(_) => warn!(server = %self.name, "Shutdown request timed out"),
            }
        }

        self.stop_writer.cancel();
        if let Some(writer) = self.writer.lock().await.take() {
            let _ = tokio::time::timeout(EXIT_GRACE, writer).await;
        }

        if let Some(mut child) = self.child.lock().await.take() {
            let exited = matches!(tokio::time::timeout(EXIT_GRACE, child.wait()).await, Ok(Ok(_)));
            if !exited {
                child.kill_tree().await.map_err(|e| BridgeError::from_process(&self.name, e))?;
            }
        }

        self.connection.close("client shut down");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!(server = %self.name, "Language server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    /// Minimal server: answers initialize and shutdown, then publishes one diagnostic
    fn fake_server(stream: DuplexStream) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(stream);
            let mut reader = BufReader::new(read_half);
            let mut seen = Vec::new();
            while let Ok(Some(body)) = read_message(&mut reader).await {
                let message: Value = serde_json::from_str(&body).unwrap();
                let method = message["method"].as_str().unwrap_or_default().to_string();
                seen.push(method.clone());
                let reply = match method.as_str() {
                    "initialize" => Some(json!({
                        "jsonrpc": "2.0",
                        "id": message["id"],
                        "result": { "capabilities": { "hoverProvider": true, "textDocumentSync": 2 } },
                    })),
                    "initialized" => Some(json!({
                        "jsonrpc": "2.0",
                        "method": "textDocument/publishDiagnostics",
                        "params": { "uri": "file:///a.go", "diagnostics": [] },
                    })),
                    "shutdown" => Some(json!({ "jsonrpc": "2.0", "id": message["id"], "result": null })),
                    "exit" => break,
                    _ => None,
                };
                if let Some(reply) = reply {
                    write_message(&mut write_half, &reply.to_string()).await.unwrap();
                }
            }
            seen
        })
    }

    #[tokio::test]
    async fn test_initialize_handshake_and_shutdown() {
        let (client_side, server_side) = duplex(64 * 1024);
        let server = fake_server(server_side);
        let (read_half, write_half) = tokio::io::split(client_side);
        let client = StdioLanguageClient::connect("gopls", read_half, write_half);
        let mut notifications = client.subscribe_notifications();

        let capabilities = client.initialize(Some(Path::new("/work"))).await.unwrap();
        assert!(capabilities.hover_provider.is_some());
        assert!(capabilities.completion_provider.is_none());

        let pushed = notifications.recv().await.unwrap();
        assert_eq!(pushed.method, "textDocument/publishDiagnostics");

        client.shutdown().await.unwrap();
        assert!(!client.is_running());
        assert_eq!(server.await.unwrap(), vec!["initialize", "initialized", "shutdown", "exit"]);
        assert!(matches!(
            client.request("textDocument/hover", json!({})).await,
            Err(BridgeError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_server_exit_fails_pending_requests() {
        let (client_side, server_side) = duplex(1024);
        let (read_half, write_half) = tokio::io::split(client_side);
        let client = StdioLanguageClient::connect("gopls", read_half, write_half);

        let request = tokio::spawn(async move {
            client.request("textDocument/hover", json!({})).await
        });
        tokio::task::yield_now().await;
        drop(server_side);
        assert!(matches!(
            request.await.unwrap(),
            Err(BridgeError::ConnectionClosed(_)) | Err(BridgeError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_missing_server_binary() {
        let launch = ServerLaunch::new("gopls", "/nonexistent/gopls");
        let err = StdioLauncher::new().launch(&launch).await.err().unwrap();
        assert_eq!(err.missing_tool(), Some("gopls"));
    }
}
