//! # gopherlink-tools
//!
//! Everything about the external Go tools themselves: which ones exist, where
//! they live on disk, how to install them, and whether the language server is
//! due for an update.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gopherlink_config::ExtensionConfig;
//! use gopherlink_process::SystemExecutor;
//! use gopherlink_tools::{HttpConfig, ModuleProxyRegistry, ToolResolver, VersionGate};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtensionConfig::default();
//! let resolver = ToolResolver::from_config(&config);
//! let gopls = resolver.resolve("gopls")?;
//!
//! let registry = ModuleProxyRegistry::new(&HttpConfig::from_extension(&config))?;
//! let gate = VersionGate::new(Arc::new(SystemExecutor::new()), Arc::new(registry));
//! if gate.should_update("gopls", &gopls).await? {
//!     println!("gopls is out of date");
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod http;
pub mod installer;
pub mod prompt;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod version;

pub use catalog::{
    all_tools, get_tool, important_tools, tool_for_workspace, ToolDescriptor, LANGUAGE_SERVER,
};
pub use error::{ErrorKind, Result, ToolsError};
pub use http::HttpConfig;
pub use installer::{InstallFailure, InstallReport, PromptOutcome, ToolInstaller};
pub use prompt::{MessageLevel, PromptChoice, PromptRequest, Prompter, UserMessage};
pub use registry::{escape_module_path, ModuleProxyRegistry, VersionRegistry, DEFAULT_MODULE_PROXY};
pub use resolver::{is_module_workspace, ToolResolver};
pub use session::{DeclinedSet, SessionState};
pub use version::{coerce_version, parse_version_output, InstalledVersion, VersionGate};
