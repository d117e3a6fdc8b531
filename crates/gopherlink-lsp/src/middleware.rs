//! Feature gating in front of the language server
//!
//! Every request to the server passes through [`FeatureGatedClient`]:
//!
//! ```text
//! editor request
//!     ↓
//! FeatureGatedClient (decide(feature))
//!     ↓ Disabled → no-op answer, never forwarded
//!     ↓ otherwise
//! StdioLanguageClient → gopls
//! ```
//!
//! Pushed diagnostics go the other way and are only admitted while the server
//! is the diagnostics provider.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::capabilities::ServerCapabilities;
use crate::client::LanguageClient;
use crate::error::Result;
use crate::negotiator::{CapabilityNegotiator, Decision};
use crate::protocol::ServerNotification;

const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

/// Decorator that enforces feature toggles on a language client
pub struct FeatureGatedClient {
    inner: Arc<dyn LanguageClient>,
    negotiator: Arc<CapabilityNegotiator>,
}

impl FeatureGatedClient {
    pub fn new(inner: Arc<dyn LanguageClient>, negotiator: Arc<CapabilityNegotiator>) -> Self {
        Self { inner, negotiator }
    }

    pub fn inner(&self) -> &Arc<dyn LanguageClient> {
        &self.inner
    }
}

#[async_trait]
impl LanguageClient for FeatureGatedClient {
    async fn initialize(&self, root: Option<&Path>) -> Result<ServerCapabilities> {
        self.inner.initialize(root).await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if let Some(feature) = Feature::from_method(method) {
            if self.negotiator.decide(feature) == Decision::Disabled {
                debug!(feature = %feature, "Feature disabled, not forwarding");
                return Ok(feature.empty_response());
            }
        }
        self.inner.request(method, params).await
    }

    fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.inner.notify(method, params)
    }

    fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification> {
        self.inner.subscribe_notifications()
    }

    fn admits_notification(&self, notification: &ServerNotification) -> bool {
        if notification.method == PUBLISH_DIAGNOSTICS {
            return self.negotiator.decide(Feature::Diagnostics) == Decision::Server;
        }
        self.inner.admits_notification(notification)
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gopherlink_config::FeatureToggleSet;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records forwarded methods and echoes them back
    #[derive(Default)]
    struct EchoClient {
        forwarded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageClient for EchoClient {
        async fn initialize(&self, _root: Option<&Path>) -> Result<ServerCapabilities> {
            Ok(ServerCapabilities::default())
        }

        async fn request(&self, method: &str, _params: Value) -> Result<Value> {
            self.forwarded.lock().push(method.to_string());
            Ok(json!(method))
        }

        fn notify(&self, _method: &str, _params: Value) -> Result<()> {
            Ok(())
        }

        fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification> {
            broadcast::channel(1).1
        }

        fn is_running(&self) -> bool {
            true
        }

        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
    }

    fn gated(toggles: FeatureToggleSet) -> (FeatureGatedClient, Arc<EchoClient>, Arc<CapabilityNegotiator>) {
        let inner = Arc::new(EchoClient::default());
        let negotiator = Arc::new(CapabilityNegotiator::new(toggles, true));
        (
            FeatureGatedClient::new(inner.clone(), negotiator.clone()),
            inner,
            negotiator,
        )
    }

    #[tokio::test]
    async fn test_disabled_feature_never_forwarded() {
        let toggles = FeatureToggleSet::all_enabled()
            .with(Feature::References, false)
            .with(Feature::Hover, false);
        let (client, inner, _) = gated(toggles);

        assert_eq!(client.request("textDocument/references", json!({})).await.unwrap(), json!([]));
        assert_eq!(client.request("textDocument/hover", json!({})).await.unwrap(), Value::Null);
        assert_eq!(
            client.request("textDocument/definition", json!({})).await.unwrap(),
            json!("textDocument/definition")
        );
        assert_eq!(*inner.forwarded.lock(), vec!["textDocument/definition"]);
    }

    #[tokio::test]
    async fn test_unknown_methods_pass_through() {
        let (client, inner, _) = gated(FeatureToggleSet::all_disabled());
        client.request("workspace/executeCommand", json!({})).await.unwrap();
        assert_eq!(inner.forwarded.lock().len(), 1);
    }

    #[test]
    fn test_pushed_diagnostics_only_on_server_path() {
        let (client, _, negotiator) = gated(FeatureToggleSet::all_enabled());
        let published = ServerNotification {
            method: PUBLISH_DIAGNOSTICS.to_string(),
            params: Some(json!({ "uri": "file:///a.go", "diagnostics": [] })),
        };
        assert!(!client.admits_notification(&published));

        let caps = ServerCapabilities::from_initialize_result(&json!({
            "capabilities": { "textDocumentSync": 1 }
        }));
        negotiator.resolve_capabilities(&caps);
        assert!(client.admits_notification(&published));

        let (disabled, _, negotiator) =
            gated(FeatureToggleSet::all_enabled().with(Feature::Diagnostics, false));
        negotiator.resolve_capabilities(&caps);
        assert!(!disabled.admits_notification(&published));
    }
}
