//! gopherlink command line interface
//!
//! Inspect how features are negotiated for a workspace, send single requests
//! through the same routing an editor would use, and manage the Go tools the
//! fallbacks depend on.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;
pub mod prompter;

pub use cli::{Cli, Commands};
pub use prompter::TerminalPrompter;
