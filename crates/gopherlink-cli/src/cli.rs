//! Argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// gopherlink - route Go editor features between gopls and the classic Go tools
#[derive(Parser, Debug)]
#[command(name = "gopherlink")]
#[command(bin_name = "gopherlink")]
#[command(about = "Route Go editor features between gopls and the classic Go tools")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file; defaults to the user configuration directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace root
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Accept every prompt without asking
    #[arg(short, long, global = true)]
    pub yes: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show who answers each feature in this workspace
    Capabilities,

    /// Send one feature request and print the answer as JSON
    Request {
        /// Feature name, e.g. hover or type-definition
        feature: String,

        /// Go source file the request is about
        file: PathBuf,

        /// Zero-based line of the cursor
        #[arg(long, default_value_t = 0)]
        line: u32,

        /// Zero-based UTF-16 column of the cursor
        #[arg(long, default_value_t = 0)]
        character: u32,

        /// New identifier for rename requests
        #[arg(long)]
        new_name: Option<String>,

        /// Query for workspace symbol requests
        #[arg(long)]
        query: Option<String>,
    },

    /// Show where each tool resolves to
    Resolve {
        /// Tools to look up; every known tool when empty
        tools: Vec<String>,
    },

    /// Install tools; the missing important tools when none are named
    Install {
        tools: Vec<String>,
    },

    /// Check whether the language server has a newer release
    CheckUpdate,

    /// Run an editor command (restart-server, prompt-for-install, prompt-for-update)
    Command {
        name: String,
    },
}
