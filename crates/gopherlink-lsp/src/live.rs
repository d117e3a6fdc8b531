//! Change-triggered diagnostics through gotype-live

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gopherlink_config::{ExtensionConfig, Feature};

use crate::checks::{group_by_uri, LatestOnlyRunner};
use crate::document::{modified_archive, Diagnostic, SEVERITY_ERROR};
use crate::error::Result;
use crate::fallback::ToolContext;
use crate::negotiator::{CapabilityNegotiator, Decision};

const TOOL: &str = "gotype-live";

/// Whether live diagnostics should run.
///
/// Live checking is the lower-fidelity path and never runs while the server
/// provides diagnostics, nor while diagnostics are switched off.
pub fn live_errors_active(config: &ExtensionConfig, negotiator: &CapabilityNegotiator) -> bool {
    config.live_errors.enabled && negotiator.decide(Feature::Diagnostics) == Decision::Fallback
}

/// Debounced type checking of the buffer being edited
pub struct LiveChecker {
    context: Arc<ToolContext>,
    runner: LatestOnlyRunner,
    delay: Duration,
}

impl LiveChecker {
    pub fn new(context: Arc<ToolContext>) -> Self {
        let delay = Duration::from_millis(context.config().live_errors.delay_ms);
        Self {
            context,
            runner: LatestOnlyRunner::new(),
            delay,
        }
    }

    /// Check `text` after the quiet period.
    ///
    /// A later change restarts the wait; only the last change in a burst runs
    /// the tool. Returns None for superseded changes.
    pub async fn on_change(
        &self,
        path: &Path,
        text: &str,
    ) -> Option<Result<BTreeMap<String, Vec<Diagnostic>>>> {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let args = vec![
            "-e".to_string(),
            "-a".to_string(),
            format!("-lf={}", path.display()),
            "-modified".to_string(),
            dir.to_string_lossy().into_owned(),
        ];
        let archive = modified_archive(path, text);
        let context = &self.context;
        let delay = self.delay;
        let dir_ref = &dir;

        let output = self
            .runner
            .run(|token| async move {
                tokio::select! {
                    _ = token.cancelled() => return None,
                    _ = tokio::time::sleep(delay) => {}
                }
                Some(context.run(TOOL, args, Some(archive), dir_ref, Some(token)).await)
            })
            .await
            .flatten()?;

        Some(match output {
            Ok(output) => group_by_uri(&output.combined(), &dir, path, text, SEVERITY_ERROR, TOOL),
            Err(e) if e.is_cancelled() => return None,
            Err(e) => Err(e),
        })
    }

    pub fn cancel(&self) {
        self.runner.cancel();
    }
}
