//! Property tests for per-feature negotiation

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::{Feature, FeatureToggleSet};
use gopherlink_lsp::{
    CapabilityNegotiator, Decision, FallbackProvider, FallbackProviderSet, FeatureRequest,
    InMemoryProviderRegistry, ProviderRegistry, Result, Route, ServerCapabilities,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

struct NullProvider(Feature);

#[async_trait]
impl FallbackProvider for NullProvider {
    fn feature(&self) -> Feature {
        self.0
    }

    fn tool(&self) -> Option<&str> {
        None
    }

    async fn provide(&self, _request: &FeatureRequest) -> Result<Value> {
        Ok(self.0.empty_response())
    }
}

fn fallbacks() -> FallbackProviderSet {
    FallbackProviderSet::from_providers(
        Feature::ALL
            .iter()
            .map(|f| Arc::new(NullProvider(*f)) as Arc<dyn FallbackProvider>)
            .collect(),
    )
}

fn arb_toggles() -> impl Strategy<Value = FeatureToggleSet> {
    proptest::collection::vec(any::<bool>(), Feature::ALL.len()).prop_map(|flags| {
        Feature::ALL
            .iter()
            .zip(flags)
            .fold(FeatureToggleSet::all_enabled(), |acc, (f, on)| acc.with(*f, on))
    })
}

fn arb_advertised() -> impl Strategy<Value = BTreeSet<Feature>> {
    proptest::collection::btree_set((0..Feature::ALL.len()).prop_map(|i| Feature::ALL[i]), 0..=Feature::ALL.len())
}

fn capabilities(advertised: &BTreeSet<Feature>) -> ServerCapabilities {
    let providers: Map<String, Value> = advertised
        .iter()
        .map(|f| (f.capability_key().to_string(), json!(true)))
        .collect();
    ServerCapabilities::from_initialize_result(&json!({ "capabilities": providers }))
}

fn handles_for(registry: &InMemoryProviderRegistry, feature: Feature) -> usize {
    registry
        .live_handles()
        .iter()
        .filter(|h| h.feature() == feature)
        .count()
}

proptest! {
    /// Every feature ends up with exactly the answering path its decision names
    #[test]
    fn prop_one_path_per_feature(
        toggles in arb_toggles(),
        server in any::<bool>(),
        advertised in arb_advertised(),
    ) {
        let negotiator = CapabilityNegotiator::new(toggles, server);
        let registry = InMemoryProviderRegistry::new();
        negotiator.mark_pending(&registry);
        negotiator.resolve_capabilities(&capabilities(&advertised));
        let decisions = negotiator.negotiate(&registry, &fallbacks());

        for feature in Feature::ALL {
            let expected = if !toggles.is_enabled(feature) {
                Decision::Disabled
            } else if server && advertised.contains(&feature) {
                Decision::Server
            } else {
                Decision::Fallback
            };
            prop_assert_eq!(decisions[&feature], expected);
            prop_assert_eq!(negotiator.decide(feature), expected);

            let handles = handles_for(&registry, feature);
            match negotiator.route(feature) {
                Route::Fallback(Some(_)) => prop_assert_eq!(handles, 1),
                Route::Server | Route::Disabled => prop_assert_eq!(handles, 0),
                other => prop_assert!(false, "unexpected route {:?}", other),
            }
        }
    }

    /// Renegotiating never leaks registrations
    #[test]
    fn prop_renegotiation_keeps_one_handle(
        toggles in arb_toggles(),
        advertised in arb_advertised(),
        rounds in 1usize..5,
    ) {
        let negotiator = CapabilityNegotiator::new(toggles, true);
        let registry = InMemoryProviderRegistry::new();
        let set = fallbacks();

        for round in 0..rounds {
            if round % 2 == 1 {
                negotiator.mark_pending(&registry);
                prop_assert!(registry.live_handles().is_empty());
            }
            negotiator.resolve_capabilities(&capabilities(&advertised));
            negotiator.negotiate(&registry, &set);
        }

        let expected = Feature::ALL
            .iter()
            .filter(|f| negotiator.decide(**f) == Decision::Fallback)
            .count();
        let live = registry.live_handles();
        prop_assert_eq!(live.len(), expected);
        prop_assert!(live.iter().all(|h| h.epoch() == negotiator.epoch()));
    }

    /// Without known capabilities nothing is routed to the server
    #[test]
    fn prop_unknown_capabilities_fall_back(toggles in arb_toggles()) {
        let negotiator = CapabilityNegotiator::new(toggles, true);
        for feature in Feature::ALL {
            let decision = negotiator.decide(feature);
            prop_assert_ne!(decision, Decision::Server);
            prop_assert_eq!(decision == Decision::Disabled, !toggles.is_enabled(feature));
        }
    }
}
