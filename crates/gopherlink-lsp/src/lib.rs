//! Capability negotiation between gopls and single-purpose Go tools
//!
//! For every editor feature this crate decides who answers: the language
//! server when it is enabled and advertises the feature, a fallback adapter
//! around a classic Go tool otherwise, or nobody when the feature is switched
//! off.
//!
//! # Features
//!
//! - **Per-feature negotiation**: one decision and one live registration per feature
//! - **Feature gating**: disabled features are answered locally and never reach the server
//! - **Serialized lifecycle**: concurrent restarts share a single new server
//! - **Fallback adapters**: gocode, gogetdoc, godef, guru, gorename, go-outline,
//!   go-symbols, formatters and linters behind one trait
//! - **Save and live checks**: lint, vet and build with latest-only cancellation
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Session                            │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐     ┌──────────────────────────┐ │
//! │  │ CapabilityNegotiator │────▶│ ProviderRegistry         │ │
//! │  │ (decide / negotiate) │     │ (fallback registrations) │ │
//! │  └──────────┬───────────┘     └────────────┬─────────────┘ │
//! │             │                              │               │
//! │  ┌──────────▼───────────┐     ┌────────────▼─────────────┐ │
//! │  │ ProtocolBridge       │     │ FallbackProviderSet      │ │
//! │  │  FeatureGatedClient  │     │  ToolContext → Go tools  │ │
//! │  │  StdioLanguageClient │     └──────────────────────────┘ │
//! │  └──────────────────────┘                                  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gopherlink_config::{ExtensionConfig, Feature};
//! use gopherlink_lsp::{Position, Session, SessionDeps};
//! # use gopherlink_tools::{Prompter, PromptChoice, PromptRequest, UserMessage};
//! # struct Quiet;
//! # #[async_trait::async_trait]
//! # impl Prompter for Quiet {
//! #     async fn confirm(&self, _r: PromptRequest) -> Option<PromptChoice> { None }
//! #     async fn show(&self, _m: UserMessage) {}
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::activate(
//!     ExtensionConfig::default(),
//!     "/home/me/project",
//!     SessionDeps::new(Arc::new(Quiet)),
//! ).await?;
//!
//! let request = session
//!     .request_for("/home/me/project/main.go".as_ref())?
//!     .at(Position::new(10, 4));
//! let hover = session.request(Feature::Hover, request).await;
//! println!("{}", hover);
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod capabilities;
pub mod checks;
pub mod client;
pub mod commands;
pub mod connection;
pub mod document;
pub mod error;
pub mod fallback;
pub mod live;
pub mod middleware;
pub mod negotiator;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use bridge::{BridgeHandle, ProtocolBridge, Readiness};
pub use capabilities::ServerCapabilities;
pub use checks::{
    CheckKind, CheckOutcome, CheckReport, CheckRunner, DiagnosticCollection, DiagnosticSource,
    LatestOnlyRunner,
};
pub use client::{LanguageClient, ServerLaunch, ServerLauncher, StdioLanguageClient, StdioLauncher};
pub use commands::SessionCommand;
pub use document::{
    file_uri, uri_to_path, Diagnostic, FeatureRequest, Location, Position, Range, TextEdit,
};
pub use error::{BridgeError, Result};
pub use fallback::{FallbackProvider, FallbackProviderSet, ToolContext};
pub use live::{live_errors_active, LiveChecker};
pub use middleware::FeatureGatedClient;
pub use negotiator::{CapabilityNegotiator, Decision, Route};
pub use protocol::ServerNotification;
pub use registry::{InMemoryProviderRegistry, ProviderRegistry, RegisteredProviderHandle};
pub use session::{Session, SessionDeps};
