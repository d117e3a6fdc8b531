//! Editor-side provider registry

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gopherlink_config::Feature;
use parking_lot::RwLock;
use tracing::debug;

use crate::fallback::FallbackProvider;

/// Opaque token for one registered provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisteredProviderHandle {
    id: u64,
    feature: Feature,
    epoch: u64,
}

impl RegisteredProviderHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    /// Negotiation epoch the handle was created in
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Where fallback providers are subscribed so the editor can call them
pub trait ProviderRegistry: Send + Sync {
    fn register(
        &self,
        feature: Feature,
        provider: Arc<dyn FallbackProvider>,
        epoch: u64,
    ) -> RegisteredProviderHandle;

    /// Remove a provider; disposing twice is a no-op
    fn dispose(&self, handle: &RegisteredProviderHandle);

    /// The live provider for `feature`, if any
    fn provider_for(&self, feature: Feature) -> Option<Arc<dyn FallbackProvider>>;

    fn live_handles(&self) -> Vec<RegisteredProviderHandle>;
}

/// Registry kept in process memory
#[derive(Default)]
pub struct InMemoryProviderRegistry {
    next_id: AtomicU64,
    entries: RwLock<BTreeMap<u64, (RegisteredProviderHandle, Arc<dyn FallbackProvider>)>>,
}

impl InMemoryProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProviderRegistry for InMemoryProviderRegistry {
    fn register(
        &self,
        feature: Feature,
        provider: Arc<dyn FallbackProvider>,
        epoch: u64,
    ) -> RegisteredProviderHandle {
        let handle = RegisteredProviderHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            feature,
            epoch,
        };
        debug!(feature = %feature, id = handle.id, epoch, "Registered fallback provider");
        self.entries
            .write()
            .insert(handle.id, (handle.clone(), provider));
        handle
    }

    fn dispose(&self, handle: &RegisteredProviderHandle) {
        if self.entries.write().remove(&handle.id).is_some() {
            debug!(feature = %handle.feature, id = handle.id, "Disposed fallback provider");
        }
    }

    fn provider_for(&self, feature: Feature) -> Option<Arc<dyn FallbackProvider>> {
        self.entries
            .read()
            .values()
            .rev()
            .find(|(h, _)| h.feature == feature)
            .map(|(_, p)| p.clone())
    }

    fn live_handles(&self) -> Vec<RegisteredProviderHandle> {
        self.entries.read().values().map(|(h, _)| h.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::test_support::StaticProvider;
    use serde_json::json;

    fn provider(feature: Feature) -> Arc<dyn FallbackProvider> {
        Arc::new(StaticProvider::new(feature, json!([])))
    }

    #[test]
    fn test_register_and_dispose() {
        let registry = InMemoryProviderRegistry::new();
        let handle = registry.register(Feature::Hover, provider(Feature::Hover), 1);

        assert_eq!(handle.feature(), Feature::Hover);
        assert_eq!(handle.epoch(), 1);
        assert!(registry.provider_for(Feature::Hover).is_some());
        assert!(registry.provider_for(Feature::Completion).is_none());

        registry.dispose(&handle);
        registry.dispose(&handle);
        assert!(registry.provider_for(Feature::Hover).is_none());
        assert!(registry.live_handles().is_empty());
    }

    #[test]
    fn test_handles_are_unique() {
        let registry = InMemoryProviderRegistry::new();
        let a = registry.register(Feature::Hover, provider(Feature::Hover), 1);
        let b = registry.register(Feature::Hover, provider(Feature::Hover), 2);
        assert_ne!(a.id(), b.id());

        registry.dispose(&b);
        assert_eq!(registry.live_handles(), vec![a]);
    }
}
