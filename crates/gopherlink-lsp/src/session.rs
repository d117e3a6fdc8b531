//! One activation of the Go support, from settings load to teardown
//!
//! A [`Session`] owns the pieces the rest of the crate provides and routes
//! every editor request to whichever of them currently answers it:
//!
//! ```text
//! editor request
//!     ↓
//! Session::request ── Route::Pending ──→ wait for negotiation (startup timeout)
//!     ├─ Route::Server   → ProtocolBridge → FeatureGatedClient → gopls
//!     ├─ Route::Fallback → ProviderRegistry → FallbackProvider → Go tool
//!     └─ Route::Disabled → no-op answer
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gopherlink_config::{ConfigChangeEvent, ConfigWatcher, ExtensionConfig, Feature};
use gopherlink_process::{SystemExecutor, ToolExecutor};
use gopherlink_tools::{
    is_module_workspace, ErrorKind, HttpConfig, ModuleProxyRegistry, PromptOutcome,
    PromptRequest, Prompter, SessionState, ToolInstaller, ToolResolver, UserMessage, VersionGate,
    VersionRegistry, LANGUAGE_SERVER,
};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bridge::{BridgeHandle, ProtocolBridge};
use crate::checks::{CheckKind, CheckOutcome, CheckRunner, DiagnosticCollection, DiagnosticSource};
use crate::client::{ServerLaunch, ServerLauncher, StdioLauncher};
use crate::document::{file_uri, Diagnostic, FeatureRequest};
use crate::error::{BridgeError, Result};
use crate::fallback::{FallbackProviderSet, ToolContext};
use crate::live::{live_errors_active, LiveChecker};
use crate::negotiator::{CapabilityNegotiator, Decision, Route};
use crate::registry::{InMemoryProviderRegistry, ProviderRegistry};

const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

/// Collaborators a session is built from; tests swap them for fakes
pub struct SessionDeps {
    pub executor: Arc<dyn ToolExecutor>,
    pub launcher: Arc<dyn ServerLauncher>,
    pub prompter: Arc<dyn Prompter>,
    pub registry: Arc<dyn ProviderRegistry>,
    /// Module registry for update checks; the public module proxy when None
    pub versions: Option<Arc<dyn VersionRegistry>>,
    /// Tool lookup; built from the configuration when None
    pub resolver: Option<ToolResolver>,
    /// Fallback adapters; the standard set when None
    pub fallbacks: Option<FallbackProviderSet>,
    /// Offer missing tools and server updates right after activation
    pub activation_offers: bool,
}

impl SessionDeps {
    /// Real processes and an in-memory provider registry
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self {
            executor: Arc::new(SystemExecutor::new()),
            launcher: Arc::new(StdioLauncher::new()),
            prompter,
            registry: Arc::new(InMemoryProviderRegistry::new()),
            versions: None,
            resolver: None,
            fallbacks: None,
            activation_offers: true,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ServerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn ProviderRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_versions(mut self, versions: Arc<dyn VersionRegistry>) -> Self {
        self.versions = Some(versions);
        self
    }

    pub fn with_resolver(mut self, resolver: ToolResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackProviderSet) -> Self {
        self.fallbacks = Some(fallbacks);
        self
    }

    /// Skip the activation-time install and update offers
    pub fn without_activation_offers(mut self) -> Self {
        self.activation_offers = false;
        self
    }
}

/// An open editor buffer
#[derive(Debug, Clone)]
struct OpenDocument {
    path: PathBuf,
    text: String,
    version: i32,
    modified: bool,
}

#[derive(Debug, Deserialize)]
struct PublishDiagnosticsParams {
    uri: String,
    #[serde(default)]
    diagnostics: Vec<Diagnostic>,
}

/// Everything that lives from activation to teardown
pub struct Session {
    pub(crate) config: Arc<ExtensionConfig>,
    root: PathBuf,
    pub(crate) module_mode: bool,
    negotiator: Arc<CapabilityNegotiator>,
    registry: Arc<dyn ProviderRegistry>,
    fallbacks: FallbackProviderSet,
    bridge: Arc<ProtocolBridge>,
    pub(crate) installer: Arc<ToolInstaller>,
    pub(crate) version_gate: Option<VersionGate>,
    pub(crate) prompter: Arc<dyn Prompter>,
    pub(crate) state: SessionState,
    activation_offers: bool,
    checks: CheckRunner,
    live: LiveChecker,
    diagnostics: Arc<DiagnosticCollection>,
    documents: RwLock<HashMap<String, OpenDocument>>,
    /// True once the first negotiation pass after a (re)start finished
    negotiated: watch::Sender<bool>,
    restart_lock: tokio::sync::Mutex<()>,
    pump: Mutex<Option<JoinHandle<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Validate settings, register providers and start the language server.
    ///
    /// Returns as soon as the session exists; the server starts in the
    /// background and requests wait for it up to the startup timeout.
    pub async fn activate(
        config: ExtensionConfig,
        root: impl Into<PathBuf>,
        deps: SessionDeps,
    ) -> Result<Arc<Session>> {
        if let Err(e) = config.validate() {
            error!(error = %e, "Invalid configuration");
            let _ = deps
                .prompter
                .confirm(PromptRequest::OpenSettings {
                    message: e.to_string(),
                })
                .await;
            return Err(e.into());
        }

        let root = root.into();
        let module_mode = is_module_workspace(&root);
        let config = Arc::new(config);
        let resolver = deps
            .resolver
            .unwrap_or_else(|| ToolResolver::from_config(&config));

        let context = Arc::new(
            ToolContext::new(deps.executor.clone(), resolver.clone(), config.clone())
                .with_module_mode(module_mode),
        );
        let fallbacks = deps
            .fallbacks
            .unwrap_or_else(|| FallbackProviderSet::standard(context.clone()));
        let installer = Arc::new(ToolInstaller::new(deps.executor.clone(), resolver, &config));

        let versions = match deps.versions {
            Some(versions) => Some(versions),
            None => match ModuleProxyRegistry::new(&HttpConfig::from_extension(&config)) {
                Ok(registry) => Some(Arc::new(registry) as Arc<dyn VersionRegistry>),
                Err(e) => {
                    warn!(error = %e, "Update checks unavailable");
                    None
                }
            },
        };
        let version_gate = versions.map(|v| VersionGate::new(deps.executor.clone(), v));

        let negotiator = Arc::new(CapabilityNegotiator::from_config(&config));
        let bridge = Arc::new(ProtocolBridge::new(
            deps.launcher,
            negotiator.clone(),
            deps.prompter.clone(),
        ));
        let (negotiated, _) = watch::channel(false);

        let session = Arc::new(Session {
            config,
            root,
            module_mode,
            negotiator,
            registry: deps.registry,
            fallbacks,
            bridge,
            installer,
            version_gate,
            prompter: deps.prompter,
            state: SessionState::begin(),
            activation_offers: deps.activation_offers,
            checks: CheckRunner::new(context.clone()),
            live: LiveChecker::new(context),
            diagnostics: Arc::new(DiagnosticCollection::new()),
            documents: RwLock::new(HashMap::new()),
            negotiated,
            restart_lock: tokio::sync::Mutex::new(()),
            pump: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        });

        info!(
            root = %session.root.display(),
            module_mode,
            server = session.config.use_language_server,
            "Activating session"
        );

        if session.config.use_language_server {
            session.negotiator.mark_pending(session.registry.as_ref());
            let task = tokio::spawn(session.clone().start_server());
            session.tasks.lock().push(task);
        } else {
            session.finish_negotiation();
            let offer = session.clone();
            let task = tokio::spawn(async move { offer.offer_important_tools().await });
            session.tasks.lock().push(task);
        }

        Ok(session)
    }

    async fn start_server(self: Arc<Self>) {
        match self.launch_server().await {
            Ok(handle) => {
                self.attach(&handle);
                self.finish_negotiation();
                if self.activation_offers && self.config.check_for_updates {
                    self.offer_update().await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Continuing with fallback tools only");
                self.finish_negotiation();
                match e.missing_tool() {
                    Some(tool) => {
                        Self::install_missing(&self.installer, &self.state, self.prompter.as_ref(), tool)
                            .await
                    }
                    None => self.report_failure(Feature::Diagnostics, e).await,
                }
            }
        }
        self.offer_important_tools().await;
    }

    async fn launch_server(&self) -> Result<BridgeHandle> {
        let path = self.installer.resolver().resolve(LANGUAGE_SERVER)?;
        self.bridge.start(self.server_launch(path)).await
    }

    fn server_launch(&self, path: PathBuf) -> ServerLaunch {
        let mut launch = ServerLaunch::from_config(
            LANGUAGE_SERVER,
            path,
            &self.config,
            Some(self.root.as_path()),
        );
        if let Some(gopath) = self.config.gopath.as_deref().filter(|g| !g.trim().is_empty()) {
            launch
                .env
                .entry("GOPATH".to_string())
                .or_insert_with(|| gopath.to_string());
        }
        launch
    }

    /// Register providers for the current capabilities and release waiters
    fn finish_negotiation(&self) {
        self.negotiator
            .negotiate(self.registry.as_ref(), &self.fallbacks);
        if self.negotiator.decide(Feature::Diagnostics) != Decision::Server {
            self.diagnostics.clear_source(DiagnosticSource::Server);
        }
        if !live_errors_active(&self.config, &self.negotiator) {
            self.live.cancel();
            self.diagnostics.clear_source(DiagnosticSource::Live);
        }
        self.negotiated.send_replace(true);
    }

    /// Replay open documents to a fresh server and start relaying its diagnostics
    fn attach(&self, handle: &BridgeHandle) {
        let client = handle.client();
        for (uri, document) in self.documents.read().iter() {
            let opened = client.notify(
                "textDocument/didOpen",
                json!({
                    "textDocument": {
                        "uri": uri,
                        "languageId": "go",
                        "version": document.version,
                        "text": document.text,
                    }
                }),
            );
            if let Err(e) = opened {
                warn!(uri = %uri, error = %e, "Could not reopen document on the server");
            }
        }

        let mut notifications = client.subscribe_notifications();
        let diagnostics = self.diagnostics.clone();
        let epoch = handle.epoch();
        let pump = tokio::spawn(async move {
            loop {
                let notification = match notifications.recv().await {
                    Ok(notification) => notification,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(epoch, skipped, "Dropped server notifications");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if notification.method != PUBLISH_DIAGNOSTICS
                    || !client.admits_notification(&notification)
                {
                    continue;
                }
                let params = notification.params.unwrap_or(Value::Null);
                match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                    Ok(published) => diagnostics.set(
                        DiagnosticSource::Server,
                        &published.uri,
                        published.diagnostics,
                    ),
                    Err(e) => warn!(epoch, error = %e, "Malformed published diagnostics"),
                }
            }
            debug!(epoch, "Notification pump stopped");
        });

        if let Some(previous) = self.pump.lock().replace(pump) {
            previous.abort();
        }
    }

    async fn offer_update(&self) {
        let Some(gate) = &self.version_gate else {
            return;
        };
        let outcome = self
            .installer
            .prompt_for_update(LANGUAGE_SERVER, gate, &self.state, self.prompter.as_ref())
            .await;
        self.after_update(outcome).await;
    }

    /// Restart onto a freshly installed server
    pub(crate) async fn after_update(&self, outcome: PromptOutcome) {
        if let PromptOutcome::Installed(report) = outcome {
            if report.is_complete() {
                if let Err(e) = self.restart_server().await {
                    warn!(error = %e, "Restart after update failed");
                }
            }
        }
    }

    async fn install_missing(
        installer: &ToolInstaller,
        state: &SessionState,
        prompter: &dyn Prompter,
        tool: &str,
    ) {
        let outcome = installer.prompt_for_missing_tool(tool, state, prompter).await;
        debug!(tool = %tool, outcome = ?outcome, "Missing tool prompt finished");
    }

    async fn offer_important_tools(&self) {
        if !self.activation_offers {
            return;
        }
        let outcome = self
            .installer
            .offer_missing_important_tools(self.module_mode, &self.state, self.prompter.as_ref())
            .await;
        debug!(outcome = ?outcome, "Important tools offer finished");
    }

    /// Answer one editor request.
    ///
    /// Never fails: errors are reported to the user and answered with the
    /// feature's no-op value.
    pub async fn request(&self, feature: Feature, request: FeatureRequest) -> Value {
        match self.answer(feature, &request).await {
            Ok(value) => value,
            Err(e) => {
                self.report_failure(feature, e).await;
                feature.empty_response()
            }
        }
    }

    async fn answer(&self, feature: Feature, request: &FeatureRequest) -> Result<Value> {
        let mut route = self.negotiator.route(feature);
        if route == Route::Pending {
            route = self.wait_for_route(feature).await;
        }

        match route {
            Route::Disabled => Ok(feature.empty_response()),
            Route::Server => self.ask_server(feature, request).await,
            Route::Fallback(Some(_)) => match self.registry.provider_for(feature) {
                Some(provider) => provider.provide(request).await,
                None => Ok(feature.empty_response()),
            },
            Route::Fallback(None) => Ok(feature.empty_response()),
            Route::Pending => self.ask_fallback(feature, request).await,
        }
    }

    /// Route once negotiation finishes; Pending when the startup timeout passed
    async fn wait_for_route(&self, feature: Feature) -> Route {
        if self.wait_negotiated(self.config.startup_timeout()).await {
            self.negotiator.route(feature)
        } else {
            debug!(feature = %feature, "Server not ready in time, using fallback");
            Route::Pending
        }
    }

    /// Wait until providers are registered; false on timeout
    pub async fn wait_negotiated(&self, timeout: Duration) -> bool {
        let mut rx = self.negotiated.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|done| *done))
            .await
            .map(|waited| waited.is_ok())
            .unwrap_or(false)
    }

    async fn ask_server(&self, feature: Feature, request: &FeatureRequest) -> Result<Value> {
        let Some(handle) = self.bridge.current() else {
            return self.ask_fallback(feature, request).await;
        };

        // push-only servers answer diagnostics through publishDiagnostics
        if feature == Feature::Diagnostics && handle.capabilities().provider(feature).is_none() {
            let pushed = self
                .diagnostics
                .get_from(DiagnosticSource::Server, &request.uri);
            return Ok(serde_json::to_value(pushed)?);
        }

        let answer = handle
            .client()
            .request(feature.method(), request.to_lsp_params(feature))
            .await;
        match answer {
            Ok(value) if feature == Feature::Diagnostics => {
                Ok(value.get("items").cloned().unwrap_or_else(|| feature.empty_response()))
            }
            Err(BridgeError::NotRunning) | Err(BridgeError::ConnectionClosed(_)) => {
                warn!(feature = %feature, "Language server gone, using fallback");
                self.ask_fallback(feature, request).await
            }
            other => other,
        }
    }

    async fn ask_fallback(&self, feature: Feature, request: &FeatureRequest) -> Result<Value> {
        match self.fallbacks.get(feature) {
            Some(provider) => provider.provide(request).await,
            None => Ok(feature.empty_response()),
        }
    }

    async fn report_failure(&self, feature: Feature, err: BridgeError) {
        if err.is_cancelled() {
            debug!(feature = %feature, error = %err, "Request superseded");
            return;
        }
        if let Some(tool) = err.missing_tool().map(str::to_string) {
            info!(feature = %feature, tool = %tool, "Tool missing");
            let installer = self.installer.clone();
            let state = self.state.clone();
            let prompter = self.prompter.clone();
            let task = tokio::spawn(async move {
                Self::install_missing(&installer, &state, prompter.as_ref(), &tool).await
            });
            self.tasks.lock().push(task);
            return;
        }
        match err.kind() {
            ErrorKind::ConfigError => {
                error!(feature = %feature, error = %err, "Configuration problem");
                let _ = self
                    .prompter
                    .confirm(PromptRequest::OpenSettings {
                        message: err.to_string(),
                    })
                    .await;
            }
            _ => {
                error!(feature = %feature, error = %err, "Request failed");
                self.prompter
                    .show(UserMessage::error(format!(
                        "Error while running the {} request; see the log for details.",
                        feature
                    )))
                    .await;
            }
        }
    }

    /// Build a request for `path`, using the open buffer when there is one
    pub fn request_for(&self, path: &Path) -> Result<FeatureRequest> {
        let uri = file_uri(path)?;
        let open = self.documents.read().get(&uri).cloned();
        let (text, modified) = match open {
            Some(document) => (document.text, document.modified),
            None => (std::fs::read_to_string(path)?, false),
        };
        Ok(FeatureRequest::for_document(path, text)?
            .in_workspace(&self.root)
            .modified(modified))
    }

    pub fn did_open(&self, path: &Path, text: &str) -> Result<()> {
        let uri = file_uri(path)?;
        self.documents.write().insert(
            uri.clone(),
            OpenDocument {
                path: path.to_path_buf(),
                text: text.to_string(),
                version: 1,
                modified: false,
            },
        );
        self.notify_server(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": uri, "languageId": "go", "version": 1, "text": text }
            }),
        );
        Ok(())
    }

    pub fn did_close(&self, path: &Path) -> Result<()> {
        let uri = file_uri(path)?;
        if self.documents.write().remove(&uri).is_some() {
            self.notify_server(
                "textDocument/didClose",
                json!({ "textDocument": { "uri": uri } }),
            );
        }
        Ok(())
    }

    /// Record an unsaved edit and run live checks when they are active
    pub async fn on_change(&self, path: &Path, text: &str) -> Result<()> {
        let uri = file_uri(path)?;
        let version = {
            let mut documents = self.documents.write();
            let document = documents.entry(uri.clone()).or_insert_with(|| OpenDocument {
                path: path.to_path_buf(),
                text: String::new(),
                version: 0,
                modified: false,
            });
            document.text = text.to_string();
            document.version += 1;
            document.modified = true;
            document.version
        };
        self.notify_server(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": uri, "version": version },
                "contentChanges": [{ "text": text }],
            }),
        );

        if !live_errors_active(&self.config, &self.negotiator) {
            return Ok(());
        }
        match self.live.on_change(path, text).await {
            Some(Ok(by_uri)) => {
                self.diagnostics.replace_source(DiagnosticSource::Live, by_uri)
            }
            Some(Err(e)) => self.report_failure(Feature::Diagnostics, e).await,
            None => debug!(uri = %uri, "Live check superseded"),
        }
        Ok(())
    }

    /// Run the save-time checks.
    ///
    /// Lint, vet and build report separately. While the server provides
    /// diagnostics only the linter runs, since the server already reports
    /// compile errors.
    pub async fn on_save(&self, path: &Path, text: &str) -> Result<()> {
        let uri = file_uri(path)?;
        if let Some(document) = self.documents.write().get_mut(&uri) {
            document.text = text.to_string();
            document.modified = false;
        }
        self.notify_server(
            "textDocument/didSave",
            json!({ "textDocument": { "uri": uri }, "text": text }),
        );

        let outcomes = match self.negotiator.decide(Feature::Diagnostics) {
            Decision::Disabled => return Ok(()),
            Decision::Server => vec![(
                CheckKind::Lint,
                self.checks.run(CheckKind::Lint, path, text).await,
            )],
            Decision::Fallback => Vec::from(self.checks.check_on_save(path, text).await.outcomes()),
        };

        for (kind, outcome) in outcomes {
            match outcome {
                CheckOutcome::Completed(by_uri) => {
                    self.diagnostics.replace_source(kind.into(), by_uri)
                }
                CheckOutcome::Superseded => debug!(check = ?kind, "Check superseded"),
                CheckOutcome::Failed(e) => self.report_failure(Feature::Diagnostics, e).await,
            }
        }
        Ok(())
    }

    fn notify_server(&self, method: &str, params: Value) {
        let Some(handle) = self.bridge.current() else {
            return;
        };
        if let Err(e) = handle.client().notify(method, params) {
            debug!(method, error = %e, "Notification not delivered");
        }
    }

    /// Handle edited settings; returns whether a reload was requested.
    ///
    /// Registrations are not changed in place. A relevant change asks the user
    /// to reload instead.
    pub async fn on_config_changed(&self, new: &ExtensionConfig) -> bool {
        if !ExtensionConfig::requires_reload(&self.config, new) {
            return false;
        }
        info!("Configuration change needs a reload");
        let _ = self
            .prompter
            .confirm(PromptRequest::ReloadForConfigChange)
            .await;
        true
    }

    /// Follow the settings file and ask for a reload when it changes.
    ///
    /// The watcher lives until the session shuts down.
    pub fn watch_config(self: &Arc<Self>, mut watcher: ConfigWatcher) -> Result<()> {
        watcher.start()?;
        let mut events = watcher.subscribe();
        let session = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConfigChangeEvent::FileModified { path }) => {
                        // one reload per burst of writes
                        while let Ok(ConfigChangeEvent::FileModified { .. }) = events.try_recv() {}
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        debug!(path = ?path, "Settings file changed");
                        let event = watcher.reload(&session.config);
                        session.on_config_event(event).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Settings events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            if let Err(e) = watcher.stop() {
                debug!(error = %e, "Could not stop watching settings");
            }
        });
        self.tasks.lock().push(task);
        Ok(())
    }

    /// React to one reloaded settings file; returns whether a reload was requested
    pub async fn on_config_event(&self, event: ConfigChangeEvent) -> bool {
        match event {
            ConfigChangeEvent::Reloaded {
                new_config,
                requires_reload: true,
                ..
            } => self.on_config_changed(&new_config).await,
            ConfigChangeEvent::Reloaded { .. } | ConfigChangeEvent::FileModified { .. } => false,
            ConfigChangeEvent::ReloadFailed { path, error } => {
                warn!(path = ?path, error = %error, "Settings file could not be loaded");
                let _ = self
                    .prompter
                    .confirm(PromptRequest::OpenSettings { message: error })
                    .await;
                false
            }
        }
    }

    /// Stop the server, start it again and renegotiate from scratch.
    ///
    /// Restarts requested while one is running join it instead of starting
    /// another server.
    pub async fn restart_server(&self) -> Result<()> {
        if !self.config.use_language_server {
            self.prompter
                .show(UserMessage::info(
                    "The language server is disabled; enable use_language_server to restart it.",
                ))
                .await;
            return Ok(());
        }

        let seen = self.bridge.current().map(|h| h.epoch());
        let _restart = self.restart_lock.lock().await;
        let current = self.bridge.current();
        if current.as_ref().map(|h| h.epoch()) != seen {
            debug!("Restart already happened");
            return Ok(());
        }

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.negotiated.send_replace(false);
        self.negotiator.mark_pending(self.registry.as_ref());

        let restarted = match current {
            Some(handle) => self.bridge.restart(&handle).await,
            None => self.launch_server().await,
        };

        match restarted {
            Ok(handle) => {
                self.attach(&handle);
                self.finish_negotiation();
                Ok(())
            }
            Err(e) => {
                self.finish_negotiation();
                let message = e.to_string();
                self.report_failure(Feature::Diagnostics, e).await;
                Err(BridgeError::ServerStartFailed(message))
            }
        }
    }

    /// Tear the session down; outstanding tool runs are cancelled
    pub async fn shutdown(&self) {
        info!("Shutting down session");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.checks.cancel_all();
        self.live.cancel();
        self.bridge.shutdown().await;
        self.negotiator.dispose_all(self.registry.as_ref());
        self.state.clone().end();
    }

    /// Current diagnostics for `uri` from every source
    pub fn diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
        self.diagnostics.get(uri)
    }

    pub fn negotiator(&self) -> &Arc<CapabilityNegotiator> {
        &self.negotiator
    }

    pub fn bridge(&self) -> &Arc<ProtocolBridge> {
        &self.bridge
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_state(&self) -> &SessionState {
        &self.state
    }

    /// Paths of the open documents
    pub fn open_documents(&self) -> Vec<PathBuf> {
        self.documents.read().values().map(|d| d.path.clone()).collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::bridge::test_support::{FakeLauncher, RecordingPrompter};
    use crate::fallback::test_support::{ScriptedExecutor, StaticProvider};
    use crate::fallback::FallbackProvider;
    use gopherlink_process::ExecOutput;
    use tempfile::TempDir;

    pub struct Harness {
        pub session: Arc<Session>,
        pub launcher: Arc<FakeLauncher>,
        pub prompter: Arc<RecordingPrompter>,
        pub registry: Arc<InMemoryProviderRegistry>,
        pub executor: Arc<ScriptedExecutor>,
        pub dir: TempDir,
    }

    /// A session with fake server, canned fallbacks and `tools` installed
    pub async fn harness(config: ExtensionConfig, launcher: FakeLauncher, tools: &[&str]) -> Harness {
        let dir = TempDir::new().unwrap();
        for tool in tools {
            let name = format!("{}{}", tool, std::env::consts::EXE_SUFFIX);
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let launcher = Arc::new(launcher);
        let prompter = Arc::new(RecordingPrompter::default());
        let registry = Arc::new(InMemoryProviderRegistry::new());
        let executor = Arc::new(ScriptedExecutor {
            output: ExecOutput {
                status_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            },
            calls: Mutex::new(Vec::new()),
        });
        let fallbacks = FallbackProviderSet::from_providers(
            Feature::ALL
                .iter()
                .map(|f| {
                    Arc::new(StaticProvider::new(*f, json!({ "from": "fallback" })))
                        as Arc<dyn FallbackProvider>
                })
                .collect(),
        );
        let resolver = ToolResolver::new(HashMap::new(), vec![dir.path().to_path_buf()])
            .with_path_env("");

        let deps = SessionDeps::new(prompter.clone())
            .with_executor(executor.clone())
            .with_launcher(launcher.clone())
            .with_registry(registry.clone())
            .with_resolver(resolver)
            .with_fallbacks(fallbacks);
        let session = Session::activate(config, dir.path(), deps).await.unwrap();
        Harness {
            session,
            launcher,
            prompter,
            registry,
            executor,
            dir,
        }
    }
}
