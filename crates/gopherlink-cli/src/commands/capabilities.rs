//! `gopherlink capabilities`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use gopherlink_config::{ExtensionConfig, Feature};
use gopherlink_lsp::{Readiness, Route};

use crate::output::OutputStyle;
use crate::prompter::TerminalPrompter;

fn describe(route: &Route) -> &'static str {
    match route {
        Route::Pending => "pending",
        Route::Server => "server",
        Route::Fallback(Some(_)) => "fallback",
        Route::Fallback(None) => "fallback (no adapter)",
        Route::Disabled => "disabled",
    }
}

pub async fn run(config: ExtensionConfig, root: PathBuf, prompter: Arc<TerminalPrompter>) -> Result<()> {
    let wait = config.startup_timeout() + Duration::from_secs(1);
    let session = super::activate(config, root, prompter).await?;
    session.wait_negotiated(wait).await;

    let style = OutputStyle::default();
    let server = match session.bridge().readiness() {
        Readiness::Ready(epoch) => style.success(&format!("language server ready (epoch {})", epoch)),
        Readiness::Failed(reason) => style.error(&format!("language server failed: {}", reason)),
        Readiness::Starting => style.warning("language server still starting"),
        Readiness::Stopped => style.info("language server not running"),
    };
    println!("{}", server);

    let routes = session.negotiator().routes();
    for feature in Feature::ALL {
        let route = routes.get(&feature).cloned().unwrap_or(Route::Pending);
        println!("  {:<18} {}", feature.key(), describe(&route));
    }

    session.shutdown().await;
    Ok(())
}
