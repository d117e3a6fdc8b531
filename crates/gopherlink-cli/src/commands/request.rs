//! `gopherlink request`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use gopherlink_config::{ExtensionConfig, Feature};
use gopherlink_lsp::Position;

use crate::prompter::TerminalPrompter;

#[derive(Debug, Clone)]
pub struct RequestArgs {
    pub feature: String,
    pub file: PathBuf,
    pub line: u32,
    pub character: u32,
    pub new_name: Option<String>,
    pub query: Option<String>,
}

pub async fn run(
    config: ExtensionConfig,
    root: PathBuf,
    prompter: Arc<TerminalPrompter>,
    args: RequestArgs,
) -> Result<()> {
    let feature: Feature = args.feature.parse()?;
    let file = args
        .file
        .canonicalize()
        .with_context(|| format!("{} does not exist", args.file.display()))?;

    let session = super::activate(config, root, prompter).await?;
    let mut request = session
        .request_for(&file)?
        .at(Position::new(args.line, args.character));
    if let Some(name) = args.new_name {
        request = request.with_new_name(name);
    }
    if let Some(query) = args.query {
        request = request.with_query(query);
    }

    let answer = session.request(feature, request).await;
    println!("{}", serde_json::to_string_pretty(&answer)?);

    session.shutdown().await;
    Ok(())
}
