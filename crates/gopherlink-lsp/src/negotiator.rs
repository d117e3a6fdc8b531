//! Per-feature choice between the language server and fallback tools

use std::collections::{BTreeMap, BTreeSet};

use gopherlink_config::{ExtensionConfig, Feature, FeatureToggleSet};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::capabilities::ServerCapabilities;
use crate::fallback::FallbackProviderSet;
use crate::registry::{ProviderRegistry, RegisteredProviderHandle};

/// Who answers a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Server,
    Fallback,
    Disabled,
}

/// The answering path currently installed for a feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Waiting for the server to report its capabilities
    Pending,
    /// Forwarded to the server through the middleware
    Server,
    /// Answered by a registered fallback provider; None when no adapter exists
    Fallback(Option<RegisteredProviderHandle>),
    /// Switched off; answered with the feature's no-op value
    Disabled,
}

#[derive(Debug, Default)]
struct NegotiationState {
    /// None until the server has initialized
    capabilities: Option<BTreeSet<Feature>>,
    routes: BTreeMap<Feature, Route>,
    epoch: u64,
}

/// Decides, per feature, whether the server or a fallback answers.
///
/// Registrations are only changed in whole passes ([`negotiate`](Self::negotiate),
/// [`mark_pending`](Self::mark_pending)), each under one lock, so every
/// feature has exactly one route at any time.
#[derive(Debug)]
pub struct CapabilityNegotiator {
    toggles: FeatureToggleSet,
    server_enabled: bool,
    state: Mutex<NegotiationState>,
}

impl CapabilityNegotiator {
    pub fn new(toggles: FeatureToggleSet, server_enabled: bool) -> Self {
        Self {
            toggles,
            server_enabled,
            state: Mutex::new(NegotiationState::default()),
        }
    }

    pub fn from_config(config: &ExtensionConfig) -> Self {
        Self::new(config.features, config.use_language_server)
    }

    pub fn toggles(&self) -> FeatureToggleSet {
        self.toggles
    }

    pub fn server_enabled(&self) -> bool {
        self.server_enabled
    }

    pub fn decide(&self, feature: Feature) -> Decision {
        Self::decide_with(
            self.toggles,
            self.server_enabled,
            self.state.lock().capabilities.as_ref(),
            feature,
        )
    }

    fn decide_with(
        toggles: FeatureToggleSet,
        server_enabled: bool,
        capabilities: Option<&BTreeSet<Feature>>,
        feature: Feature,
    ) -> Decision {
        if !toggles.is_enabled(feature) {
            return Decision::Disabled;
        }
        match capabilities {
            Some(supported) if server_enabled && supported.contains(&feature) => Decision::Server,
            _ => Decision::Fallback,
        }
    }

    pub fn capabilities_known(&self) -> bool {
        self.state.lock().capabilities.is_some()
    }

    /// Record what the server advertised
    pub fn resolve_capabilities(&self, capabilities: &ServerCapabilities) {
        let supported = capabilities.supported_features();
        debug!(supported = ?supported, "Server capabilities resolved");
        self.state.lock().capabilities = Some(supported);
    }

    /// Forget the server's capabilities, e.g. before a restart
    pub fn reset_capabilities(&self) {
        self.state.lock().capabilities = None;
    }

    /// Put every enabled feature on hold until the server is ready.
    ///
    /// Existing fallback registrations are disposed; disabled features stay
    /// disabled.
    pub fn mark_pending(&self, registry: &dyn ProviderRegistry) {
        let mut state = self.state.lock();
        state.capabilities = None;
        Self::dispose_routes(&mut state, registry);
        for feature in Feature::ALL {
            let route = if self.toggles.is_enabled(feature) {
                Route::Pending
            } else {
                Route::Disabled
            };
            state.routes.insert(feature, route);
        }
        debug!("All enabled features pending on the language server");
    }

    /// Re-register every feature to match the current decisions.
    ///
    /// Starts a new epoch: handles from earlier passes are disposed and new
    /// ones created for features answered by a fallback.
    pub fn negotiate(
        &self,
        registry: &dyn ProviderRegistry,
        fallbacks: &FallbackProviderSet,
    ) -> BTreeMap<Feature, Decision> {
        let mut state = self.state.lock();
        state.epoch += 1;
        let epoch = state.epoch;
        Self::dispose_routes(&mut state, registry);

        let mut decisions = BTreeMap::new();
        for feature in Feature::ALL {
            let decision = Self::decide_with(
                self.toggles,
                self.server_enabled,
                state.capabilities.as_ref(),
                feature,
            );
            let route = match decision {
                Decision::Disabled => Route::Disabled,
                Decision::Server => Route::Server,
                Decision::Fallback => Route::Fallback(
                    fallbacks
                        .get(feature)
                        .map(|provider| registry.register(feature, provider, epoch)),
                ),
            };
            state.routes.insert(feature, route);
            decisions.insert(feature, decision);
        }

        let count = |d: Decision| decisions.values().filter(|v| **v == d).count();
        info!(
            epoch,
            server = count(Decision::Server),
            fallback = count(Decision::Fallback),
            disabled = count(Decision::Disabled),
            "Negotiated feature providers"
        );
        decisions
    }

    /// Current route for `feature`; Pending before the first pass
    pub fn route(&self, feature: Feature) -> Route {
        self.state
            .lock()
            .routes
            .get(&feature)
            .cloned()
            .unwrap_or(Route::Pending)
    }

    pub fn routes(&self) -> BTreeMap<Feature, Route> {
        self.state.lock().routes.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Dispose every registration, e.g. at teardown
    pub fn dispose_all(&self, registry: &dyn ProviderRegistry) {
        let mut state = self.state.lock();
        Self::dispose_routes(&mut state, registry);
        state.routes.clear();
    }

    fn dispose_routes(state: &mut NegotiationState, registry: &dyn ProviderRegistry) {
        for route in state.routes.values() {
            if let Route::Fallback(Some(handle)) = route {
                registry.dispose(handle);
            }
        }
    }
}
