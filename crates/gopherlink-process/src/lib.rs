//! # gopherlink-process
//!
//! Child-process plumbing shared by every tool adapter and by the language
//! server transport.
//!
//! - [`ProcessManager`] spawns processes in their own process group
//! - [`ManagedChild`] owns a running process and can kill its whole tree
//! - [`ToolExecutor`] runs a tool to completion, feeding stdin and honoring a
//!   cancellation token
//!
//! ```rust,no_run
//! use gopherlink_process::{ProcessConfig, SystemExecutor, ToolExecutor};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SystemExecutor::new();
//! let output = executor
//!     .execute(ProcessConfig::new("gofmt").stdin("package main\n"), None)
//!     .await?;
//! assert!(output.success());
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod config;
pub mod error;
pub mod executor;
pub mod manager;

pub use child::ManagedChild;
pub use config::ProcessConfig;
pub use error::{ProcessError, Result};
pub use executor::{ExecOutput, SystemExecutor, ToolExecutor};
pub use manager::ProcessManager;
pub use tokio_util::sync::CancellationToken;
