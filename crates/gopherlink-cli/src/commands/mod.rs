//! Command handlers

pub mod capabilities;
pub mod editor;
pub mod request;
pub mod tools;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use gopherlink_config::{ConfigLoader, ExtensionConfig};
use gopherlink_lsp::{Session, SessionDeps};
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::prompter::TerminalPrompter;

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let root = workspace_root(&cli.root)?;
    let prompter = Arc::new(TerminalPrompter::new(cli.yes));

    match cli.command {
        Commands::Capabilities => capabilities::run(config, root, prompter).await,
        Commands::Request {
            feature,
            file,
            line,
            character,
            new_name,
            query,
        } => {
            let args = request::RequestArgs {
                feature,
                file,
                line,
                character,
                new_name,
                query,
            };
            request::run(config, root, prompter, args).await
        }
        Commands::Resolve { tools } => tools::resolve(&config, &tools),
        Commands::Install { tools } => tools::install(&config, &root, &tools).await,
        Commands::CheckUpdate => tools::check_update(&config).await,
        Commands::Command { name } => editor::run(config, root, prompter, &name).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<ExtensionConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    debug!(path = %loader.config_path().display(), "Loading configuration");
    let config = loader
        .load()
        .with_context(|| format!("loading {}", loader.config_path().display()))?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn workspace_root(root: &Path) -> Result<PathBuf> {
    root.canonicalize()
        .with_context(|| format!("workspace root {} does not exist", root.display()))
}

/// A session for one command; activation offers only make sense in an editor
pub(crate) async fn activate(
    config: ExtensionConfig,
    root: PathBuf,
    prompter: Arc<TerminalPrompter>,
) -> Result<Arc<Session>> {
    let deps = SessionDeps::new(prompter).without_activation_offers();
    let session = Session::activate(config, root, deps).await?;
    Ok(session)
}
