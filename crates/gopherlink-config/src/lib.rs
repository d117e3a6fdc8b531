//! gopherlink configuration
//!
//! The configuration surface consumed by capability negotiation: per-feature
//! toggles, language server launch settings, tool overrides and flag arrays,
//! and the HTTP proxy used for registry lookups.
//!
//! Configuration is loaded from an optional TOML file layered with
//! `GOPHERLINK__*` environment variables and is treated as an immutable
//! snapshot. Changes to keys that affect negotiation are reported through
//! [`ExtensionConfig::requires_reload`] so callers can prompt for a reload.

pub mod error;
pub mod features;
pub mod loader;
pub mod types;
pub mod watcher;

pub use error::{ConfigError, Result};
pub use features::{Feature, FeatureToggleSet, ResponseShape};
pub use loader::ConfigLoader;
pub use types::{expand_home, ExtensionConfig, LiveErrorsConfig, ToolFlags};
pub use watcher::{ConfigChangeEvent, ConfigWatcher};
