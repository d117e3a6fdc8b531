//! Fallback providers backed by single-purpose Go tools
//!
//! Each adapter translates one editor request into a tool invocation and the
//! tool's output back into the LSP shape the server would have produced.

mod completion;
mod format;
mod hover;
mod links;
mod lint;
mod navigation;
mod rename;
mod symbols;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::{ExtensionConfig, Feature};
use gopherlink_process::{CancellationToken, ExecOutput, ProcessConfig, ToolExecutor};
use gopherlink_tools::{tool_for_workspace, ToolResolver};
use serde_json::Value;
use tracing::debug;

use crate::document::FeatureRequest;
use crate::error::{BridgeError, Result};

pub use completion::CompletionProvider;
pub use format::FormattingProvider;
pub use hover::{HoverProvider, SignatureHelpProvider};
pub use links::DocumentLinkProvider;
pub use lint::{parse_tool_diagnostics, LintProvider};
pub use navigation::{
    DefinitionProvider, ImplementationProvider, ReferencesProvider, TypeDefinitionProvider,
};
pub use rename::{parse_unified_diff, RenameProvider};
pub use symbols::{DocumentSymbolProvider, WorkspaceSymbolProvider};

/// Answers one feature without the language server
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    fn feature(&self) -> Feature;

    /// Logical name of the tool this provider runs, if any
    fn tool(&self) -> Option<&str>;

    /// Produce the answer in the same shape the server would
    async fn provide(&self, request: &FeatureRequest) -> Result<Value>;
}

/// What every adapter needs to run its tool
pub struct ToolContext {
    executor: Arc<dyn ToolExecutor>,
    resolver: ToolResolver,
    config: Arc<ExtensionConfig>,
    env: HashMap<String, String>,
    module_mode: bool,
}

impl ToolContext {
    pub fn new(
        executor: Arc<dyn ToolExecutor>,
        resolver: ToolResolver,
        config: Arc<ExtensionConfig>,
    ) -> Self {
        let mut env = HashMap::new();
        if let Some(gopath) = config.gopath.as_deref().filter(|g| !g.trim().is_empty()) {
            env.insert("GOPATH".to_string(), gopath.to_string());
        }
        Self {
            executor,
            resolver,
            config,
            env,
            module_mode: false,
        }
    }

    /// Run module-aware tool variants where they exist
    pub fn with_module_mode(mut self, module_mode: bool) -> Self {
        self.module_mode = module_mode;
        self
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ToolResolver {
        &self.resolver
    }

    pub fn executor(&self) -> Arc<dyn ToolExecutor> {
        self.executor.clone()
    }

    pub fn module_mode(&self) -> bool {
        self.module_mode
    }

    /// Name actually run for the logical tool `tool`
    pub fn effective_tool<'a>(&self, tool: &'a str) -> &'a str {
        tool_for_workspace(tool, self.module_mode)
    }

    /// Resolve and run `tool`, returning its output whatever the exit code
    pub async fn run(
        &self,
        tool: &str,
        args: Vec<String>,
        stdin: Option<String>,
        cwd: &Path,
        cancel: Option<CancellationToken>,
    ) -> Result<ExecOutput> {
        let tool = self.effective_tool(tool);
        let path = self.resolver.resolve(tool)?;

        let mut config = ProcessConfig::for_path(path)
            .args(args)
            .working_dir(cwd)
            .envs(&self.env);
        if let Some(input) = stdin {
            config = config.stdin(input);
        }

        debug!(tool = %tool, command = %config.display(), "Running fallback tool");
        self.executor
            .execute(config, cancel)
            .await
            .map_err(|e| BridgeError::from_process(tool, e))
    }

    /// Like [`run`](Self::run), but a non-zero exit is a tool failure
    pub async fn run_checked(
        &self,
        tool: &str,
        args: Vec<String>,
        stdin: Option<String>,
        cwd: &Path,
    ) -> Result<ExecOutput> {
        let output = self.run(tool, args, stdin, cwd, None).await?;
        if !output.success() {
            let message = output.stderr.trim();
            return Err(BridgeError::tool_error(
                self.effective_tool(tool),
                if message.is_empty() {
                    format!("exited with {:?}", output.status_code)
                } else {
                    message.to_string()
                },
            ));
        }
        Ok(output)
    }
}

/// The adapters available for negotiation, at most one per feature
#[derive(Clone, Default)]
pub struct FallbackProviderSet {
    providers: BTreeMap<Feature, Arc<dyn FallbackProvider>>,
}

impl FallbackProviderSet {
    /// One tool adapter for every feature
    pub fn standard(context: Arc<ToolContext>) -> Self {
        Self::from_providers(vec![
            Arc::new(CompletionProvider::new(context.clone())),
            Arc::new(LintProvider::new(context.clone())),
            Arc::new(FormattingProvider::new(context.clone())),
            Arc::new(DefinitionProvider::new(context.clone())),
            Arc::new(TypeDefinitionProvider::new(context.clone())),
            Arc::new(HoverProvider::new(context.clone())),
            Arc::new(ReferencesProvider::new(context.clone())),
            Arc::new(RenameProvider::new(context.clone())),
            Arc::new(SignatureHelpProvider::new(context.clone())),
            Arc::new(DocumentSymbolProvider::new(context.clone())),
            Arc::new(WorkspaceSymbolProvider::new(context.clone())),
            Arc::new(ImplementationProvider::new(context)),
            Arc::new(DocumentLinkProvider::new()),
        ])
    }

    pub fn from_providers(providers: Vec<Arc<dyn FallbackProvider>>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.feature(), p)).collect(),
        }
    }

    pub fn get(&self, feature: Feature) -> Option<Arc<dyn FallbackProvider>> {
        self.providers.get(&feature).cloned()
    }

    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.providers.keys().copied()
    }
}

/// Lines of `text`, tolerant of CRLF
pub(crate) fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(|l| l.trim_end_matches('\r'))
}
