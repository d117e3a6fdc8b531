//! `gopherlink command <name>`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use gopherlink_config::ExtensionConfig;
use gopherlink_lsp::SessionCommand;

use crate::prompter::TerminalPrompter;

pub async fn run(
    config: ExtensionConfig,
    root: PathBuf,
    prompter: Arc<TerminalPrompter>,
    name: &str,
) -> Result<()> {
    let command: SessionCommand = name.parse()?;
    let wait = config.startup_timeout();
    let session = super::activate(config, root, prompter).await?;
    session.wait_negotiated(wait).await;

    let result = session.execute(command).await;
    session.shutdown().await;
    result?;
    Ok(())
}
