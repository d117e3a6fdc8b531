//! Property tests for feature toggles

use gopherlink_config::{ConfigLoader, ExtensionConfig, Feature, FeatureToggleSet};
use proptest::prelude::*;

fn arb_feature() -> impl Strategy<Value = Feature> {
    (0..Feature::ALL.len()).prop_map(|i| Feature::ALL[i])
}

fn arb_toggles() -> impl Strategy<Value = FeatureToggleSet> {
    proptest::collection::vec(any::<bool>(), Feature::ALL.len()).prop_map(|flags| {
        Feature::ALL
            .iter()
            .zip(flags)
            .fold(FeatureToggleSet::all_enabled(), |acc, (feature, on)| {
                acc.with(*feature, on)
            })
    })
}

proptest! {
    /// Changing one flag leaves every other flag untouched
    #[test]
    fn prop_with_is_local(toggles in arb_toggles(), feature in arb_feature(), on in any::<bool>()) {
        let changed = toggles.with(feature, on);
        prop_assert_eq!(changed.is_enabled(feature), on);
        for other in Feature::ALL.iter().copied().filter(|f| *f != feature) {
            prop_assert_eq!(changed.is_enabled(other), toggles.is_enabled(other));
        }
    }

    /// Toggles survive a TOML round trip through the configuration loader
    #[test]
    fn prop_toggles_survive_toml(toggles in arb_toggles()) {
        let config = ExtensionConfig { features: toggles, ..Default::default() };
        let text = toml::to_string(&config).unwrap();
        let loaded = ConfigLoader::load_from_str(&text).unwrap();
        prop_assert_eq!(loaded.features, toggles);
    }

    /// Any toggle change is a reload-relevant change
    #[test]
    fn prop_toggle_change_requires_reload(toggles in arb_toggles(), feature in arb_feature()) {
        let old = ExtensionConfig { features: toggles, ..Default::default() };
        let new = ExtensionConfig {
            features: toggles.with(feature, !toggles.is_enabled(feature)),
            ..Default::default()
        };
        prop_assert!(ExtensionConfig::requires_reload(&old, &new));
    }
}
