//! Language server lifecycle: start, stop and serialized restart

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gopherlink_tools::{Prompter, UserMessage};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::capabilities::ServerCapabilities;
use crate::client::{LanguageClient, ServerLaunch, ServerLauncher};
use crate::error::{BridgeError, Result};
use crate::middleware::FeatureGatedClient;
use crate::negotiator::CapabilityNegotiator;

/// Where the server is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Stopped,
    Starting,
    /// Initialized; carries the handle epoch
    Ready(u64),
    Failed(String),
}

/// A started server, wrapped in the feature gate
#[derive(Clone)]
pub struct BridgeHandle {
    epoch: u64,
    client: Arc<dyn LanguageClient>,
    capabilities: ServerCapabilities,
}

impl BridgeHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The gated client; requests for disabled features never reach the server
    pub fn client(&self) -> Arc<dyn LanguageClient> {
        self.client.clone()
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("epoch", &self.epoch)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Owns the language server process.
///
/// `start`, `stop` and `restart` run one at a time. A restart whose handle is
/// already stale returns the handle of the server that replaced it instead of
/// starting another one.
pub struct ProtocolBridge {
    launcher: Arc<dyn ServerLauncher>,
    negotiator: Arc<CapabilityNegotiator>,
    prompter: Arc<dyn Prompter>,
    /// Last launch; held for the duration of every lifecycle operation
    lifecycle: Mutex<Option<ServerLaunch>>,
    current: RwLock<Option<BridgeHandle>>,
    readiness: watch::Sender<Readiness>,
    epoch: AtomicU64,
    launches: AtomicUsize,
    empty_reported: AtomicBool,
}

impl ProtocolBridge {
    pub fn new(
        launcher: Arc<dyn ServerLauncher>,
        negotiator: Arc<CapabilityNegotiator>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        let (readiness, _) = watch::channel(Readiness::Stopped);
        Self {
            launcher,
            negotiator,
            prompter,
            lifecycle: Mutex::new(None),
            current: RwLock::new(None),
            readiness,
            epoch: AtomicU64::new(0),
            launches: AtomicUsize::new(0),
            empty_reported: AtomicBool::new(false),
        }
    }

    pub fn negotiator(&self) -> &Arc<CapabilityNegotiator> {
        &self.negotiator
    }

    /// Start the server, replacing any running one
    pub async fn start(&self, launch: ServerLaunch) -> Result<BridgeHandle> {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = self.current.write().take();
        if let Some(previous) = previous {
            self.shutdown_client(&previous).await;
        }
        *lifecycle = Some(launch.clone());
        self.start_locked(&launch).await
    }

    /// Stop the server behind `handle`; a stale handle is a no-op
    pub async fn stop(&self, handle: &BridgeHandle) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let current = {
            let mut current = self.current.write();
            match current.as_ref() {
                Some(h) if h.epoch == handle.epoch => current.take(),
                _ => None,
            }
        };
        if let Some(current) = current {
            self.shutdown_client(&current).await;
            self.negotiator.reset_capabilities();
            self.readiness.send_replace(Readiness::Stopped);
        }
        Ok(())
    }

    /// Stop and start again with the same launch settings.
    ///
    /// Concurrent callers holding the same handle get the same new server.
    pub async fn restart(&self, handle: &BridgeHandle) -> Result<BridgeHandle> {
        let lifecycle = self.lifecycle.lock().await;
        let current = self.current.read().clone();
        if let Some(current) = current {
            if current.epoch != handle.epoch {
                info!(epoch = current.epoch, "Restart already happened, reusing server");
                return Ok(current);
            }
        }
        let launch = lifecycle.clone().ok_or(BridgeError::NotRunning)?;

        info!(server = %launch.tool, "Restarting language server");
        let previous = self.current.write().take();
        if let Some(previous) = previous {
            self.shutdown_client(&previous).await;
        }
        self.negotiator.reset_capabilities();
        self.start_locked(&launch).await
    }

    async fn start_locked(&self, launch: &ServerLaunch) -> Result<BridgeHandle> {
        self.readiness.send_replace(Readiness::Starting);
        self.launches.fetch_add(1, Ordering::SeqCst);

        let (client, capabilities) = match self.launch_and_initialize(launch).await {
            Ok(started) => started,
            Err(e) => {
                error!(server = %launch.tool, error = %e, "Language server failed to start");
                self.readiness.send_replace(Readiness::Failed(e.to_string()));
                return Err(e);
            }
        };

        if capabilities.is_empty() {
            warn!(server = %launch.tool, "Language server advertised no capabilities");
            if !self.empty_reported.swap(true, Ordering::SeqCst) {
                self.prompter
                    .show(UserMessage::error(format!(
                        "{} did not report any capabilities; the installed Go tools will answer instead.",
                        launch.tool
                    )))
                    .await;
            }
        }
        self.negotiator.resolve_capabilities(&capabilities);

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = BridgeHandle {
            epoch,
            client: Arc::new(FeatureGatedClient::new(client, self.negotiator.clone())),
            capabilities,
        };
        *self.current.write() = Some(handle.clone());
        self.readiness.send_replace(Readiness::Ready(epoch));
        info!(server = %launch.tool, epoch, "Language server ready");
        Ok(handle)
    }

    async fn launch_and_initialize(
        &self,
        launch: &ServerLaunch,
    ) -> Result<(Arc<dyn LanguageClient>, ServerCapabilities)> {
        let client = self.launcher.launch(launch).await?;
        match client.initialize(launch.root.as_deref()).await {
            Ok(capabilities) => Ok((client, capabilities)),
            Err(e) => {
                let _ = client.shutdown().await;
                Err(e)
            }
        }
    }

    async fn shutdown_client(&self, handle: &BridgeHandle) {
        if let Err(e) = handle.client.shutdown().await {
            warn!(epoch = handle.epoch, error = %e, "Language server did not shut down cleanly");
        }
    }

    /// The running server, if any
    pub fn current(&self) -> Option<BridgeHandle> {
        self.current.read().clone()
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.borrow().clone()
    }

    pub fn subscribe_readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Wait until the server leaves `Starting`, at most `timeout`
    pub async fn wait_ready(&self, timeout: Duration) -> Result<BridgeHandle> {
        let mut rx = self.readiness.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            loop {
                let state = rx.borrow_and_update().clone();
                match state {
                    Readiness::Starting => {
                        if rx.changed().await.is_err() {
                            return Readiness::Stopped;
                        }
                    }
                    other => return other,
                }
            }
        })
        .await;

        match waited {
            Ok(Readiness::Ready(_)) => self.current().ok_or(BridgeError::NotRunning),
            Ok(Readiness::Failed(reason)) => Err(BridgeError::ServerStartFailed(reason)),
            Ok(_) => Err(BridgeError::NotRunning),
            Err(_) => Err(BridgeError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Number of times a server was launched
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Stop whatever is running
    pub async fn shutdown(&self) {
        if let Some(handle) = self.current() {
            let _ = self.stop(&handle).await;
        }
    }
}
