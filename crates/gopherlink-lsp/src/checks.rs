//! Save-time checks and the diagnostics they produce
//!
//! Lint, vet and build each run latest-only: starting a check cancels the
//! still-running previous check of the same kind, kills its process tree and
//! discards its result. The three kinds are independent of each other.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gopherlink_process::CancellationToken;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::document::{file_uri, Diagnostic, SEVERITY_ERROR, SEVERITY_WARNING};
use crate::error::{BridgeError, Result};
use crate::fallback::{parse_tool_diagnostics, ToolContext};

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// Runs one job at a time per instance, newest wins
#[derive(Debug, Default)]
pub struct LatestOnlyRunner {
    state: Mutex<RunnerState>,
}

#[derive(Debug, Default)]
struct RunnerState {
    generation: u64,
    token: Option<CancellationToken>,
}

impl LatestOnlyRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job`, cancelling whatever this runner was running before.
    ///
    /// Returns None when a newer run superseded this one, whatever the job
    /// itself produced.
    pub async fn run<F, Fut, T>(&self, job: F) -> Option<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let (generation, token) = {
            let mut state = self.state.lock();
            if let Some(previous) = state.token.take() {
                previous.cancel();
            }
            state.generation += 1;
            let token = CancellationToken::new();
            state.token = Some(token.clone());
            (state.generation, token)
        };

        let output = job(token.clone()).await;

        let mut state = self.state.lock();
        if state.generation != generation || token.is_cancelled() {
            debug!(generation, "Discarding superseded result");
            return None;
        }
        state.token = None;
        Some(output)
    }

    /// Cancel the running job, if any
    pub fn cancel(&self) {
        if let Some(token) = self.state.lock().token.take() {
            token.cancel();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    Lint,
    Vet,
    Build,
}

/// Who produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticSource {
    Server,
    Lint,
    Vet,
    Build,
    Live,
}

impl From<CheckKind> for DiagnosticSource {
    fn from(kind: CheckKind) -> Self {
        match kind {
            CheckKind::Lint => DiagnosticSource::Lint,
            CheckKind::Vet => DiagnosticSource::Vet,
            CheckKind::Build => DiagnosticSource::Build,
        }
    }
}

/// Result of one check
#[derive(Debug)]
pub enum CheckOutcome {
    /// Diagnostics keyed by document URI
    Completed(BTreeMap<String, Vec<Diagnostic>>),
    /// A newer check of the same kind replaced this one
    Superseded,
    Failed(BridgeError),
}

impl CheckOutcome {
    pub fn is_superseded(&self) -> bool {
        matches!(self, CheckOutcome::Superseded)
    }
}

/// The three save-time checks, reported separately
#[derive(Debug)]
pub struct CheckReport {
    pub lint: CheckOutcome,
    pub vet: CheckOutcome,
    pub build: CheckOutcome,
}

impl CheckReport {
    pub fn outcomes(self) -> [(CheckKind, CheckOutcome); 3] {
        [
            (CheckKind::Lint, self.lint),
            (CheckKind::Vet, self.vet),
            (CheckKind::Build, self.build),
        ]
    }
}

/// Runs lint, vet and build against a package directory
pub struct CheckRunner {
    context: Arc<ToolContext>,
    lint: LatestOnlyRunner,
    vet: LatestOnlyRunner,
    build: LatestOnlyRunner,
}

impl CheckRunner {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self {
            context,
            lint: LatestOnlyRunner::new(),
            vet: LatestOnlyRunner::new(),
            build: LatestOnlyRunner::new(),
        }
    }

    fn runner(&self, kind: CheckKind) -> &LatestOnlyRunner {
        match kind {
            CheckKind::Lint => &self.lint,
            CheckKind::Vet => &self.vet,
            CheckKind::Build => &self.build,
        }
    }

    /// Tool, arguments and severity for a check
    fn invocation(&self, kind: CheckKind) -> (String, Vec<String>, u8) {
        let config = self.context.config();
        match kind {
            CheckKind::Lint => {
                let mut args = config.tool_flags.lint.clone();
                args.push(".".to_string());
                (config.lint_tool.clone(), args, SEVERITY_WARNING)
            }
            CheckKind::Vet => {
                let mut args = vec!["vet".to_string()];
                args.extend(config.tool_flags.vet.iter().cloned());
                args.push(".".to_string());
                ("go".to_string(), args, SEVERITY_ERROR)
            }
            CheckKind::Build => {
                let mut args = vec!["build".to_string()];
                args.extend(config.tool_flags.build.iter().cloned());
                args.extend(["-o".to_string(), NULL_DEVICE.to_string(), ".".to_string()]);
                ("go".to_string(), args, SEVERITY_ERROR)
            }
        }
    }

    /// Run one check on the package containing `path`.
    ///
    /// `text` is the saved content of `path`, used to convert its columns.
    pub async fn run(&self, kind: CheckKind, path: &Path, text: &str) -> CheckOutcome {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let (tool, args, severity) = self.invocation(kind);
        let source = match kind {
            CheckKind::Lint => tool.clone(),
            CheckKind::Vet => "go vet".to_string(),
            CheckKind::Build => "go build".to_string(),
        };

        let context = &self.context;
        let result = self
            .runner(kind)
            .run(|token| async {
                context.run(&tool, args, None, &dir, Some(token)).await
            })
            .await;

        let output = match result {
            None => return CheckOutcome::Superseded,
            Some(Err(e)) if e.is_cancelled() => return CheckOutcome::Superseded,
            Some(Err(e)) => {
                warn!(check = ?kind, error = %e, "Check failed to run");
                return CheckOutcome::Failed(e);
            }
            Some(Ok(output)) => output,
        };

        match group_by_uri(&output.combined(), &dir, path, text, severity, &source) {
            Ok(grouped) => CheckOutcome::Completed(grouped),
            Err(e) => CheckOutcome::Failed(e),
        }
    }

    /// Lint, vet and build concurrently; one failing never stops the others
    pub async fn check_on_save(&self, path: &Path, text: &str) -> CheckReport {
        let (lint, vet, build) = tokio::join!(
            self.run(CheckKind::Lint, path, text),
            self.run(CheckKind::Vet, path, text),
            self.run(CheckKind::Build, path, text),
        );
        CheckReport { lint, vet, build }
    }

    pub fn cancel_all(&self) {
        self.lint.cancel();
        self.vet.cancel();
        self.build.cancel();
    }
}

pub(crate) fn group_by_uri(
    output: &str,
    dir: &Path,
    saved: &Path,
    text: &str,
    severity: u8,
    source: &str,
) -> Result<BTreeMap<String, Vec<Diagnostic>>> {
    let mut grouped: BTreeMap<String, Vec<Diagnostic>> = BTreeMap::new();
    for found in parse_tool_diagnostics(output, dir) {
        let text = (found.path == saved).then_some(text);
        grouped
            .entry(file_uri(&found.path)?)
            .or_default()
            .push(found.to_diagnostic(text, severity, source));
    }
    Ok(grouped)
}

/// Current diagnostics per source and document
#[derive(Debug, Default)]
pub struct DiagnosticCollection {
    entries: RwLock<HashMap<DiagnosticSource, BTreeMap<String, Vec<Diagnostic>>>>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one document's diagnostics from one source
    pub fn set(&self, source: DiagnosticSource, uri: &str, diagnostics: Vec<Diagnostic>) {
        let mut entries = self.entries.write();
        let by_uri = entries.entry(source).or_default();
        if diagnostics.is_empty() {
            by_uri.remove(uri);
        } else {
            by_uri.insert(uri.to_string(), diagnostics);
        }
    }

    /// Replace everything a source reported
    pub fn replace_source(&self, source: DiagnosticSource, by_uri: BTreeMap<String, Vec<Diagnostic>>) {
        let filtered = by_uri.into_iter().filter(|(_, d)| !d.is_empty()).collect();
        self.entries.write().insert(source, filtered);
    }

    pub fn clear_source(&self, source: DiagnosticSource) {
        self.entries.write().remove(&source);
    }

    pub fn get_from(&self, source: DiagnosticSource, uri: &str) -> Vec<Diagnostic> {
        self.entries
            .read()
            .get(&source)
            .and_then(|by_uri| by_uri.get(uri))
            .cloned()
            .unwrap_or_default()
    }

    /// Every source's diagnostics for `uri`
    pub fn get(&self, uri: &str) -> Vec<Diagnostic> {
        let entries = self.entries.read();
        let mut sources: Vec<_> = entries.keys().copied().collect();
        sources.sort();
        sources
            .into_iter()
            .filter_map(|s| entries.get(&s).and_then(|by_uri| by_uri.get(uri)))
            .flatten()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Position, Range};
    use crate::fallback::test_support::context;
    use std::time::Duration;

    fn diagnostic(message: &str) -> Diagnostic {
        Diagnostic {
            range: Range::at(Position::new(0, 0)),
            severity: Some(SEVERITY_ERROR),
            source: None,
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_run_discards_first_result() {
        let runner = Arc::new(LatestOnlyRunner::new());

        let slow = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run(|token| async move {
                        tokio::select! {
                            _ = token.cancelled() => "cancelled",
                            _ = tokio::time::sleep(Duration::from_secs(5)) => "first",
                        }
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = runner.run(|_| async { "second" }).await;
        assert_eq!(second, Some("second"));
        assert_eq!(slow.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_result_discarded_even_if_job_ignores_cancel() {
        let runner = Arc::new(LatestOnlyRunner::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run(|_| async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        "first"
                    })
                    .await
            })
        };
        started_rx.await.unwrap();
        assert_eq!(runner.run(|_| async { "second" }).await, Some("second"));
        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_vet_output_grouped_per_file() {
        let (context, executor, dir) = context(
            &["go"],
            "# example.com/a\n./a.go:3:2: unreachable code\n./b.go:1:1: bad\n",
        );
        let checks = CheckRunner::new(context);
        let saved = dir.path().join("a.go");

        let outcome = checks.run(CheckKind::Vet, &saved, "package a\n").await;
        let CheckOutcome::Completed(grouped) = outcome else {
            panic!("vet should complete");
        };
        assert_eq!(grouped.len(), 2);
        let a = &grouped[&file_uri(&saved).unwrap()];
        assert_eq!(a[0].source.as_deref(), Some("go vet"));
        assert_eq!(a[0].severity, Some(SEVERITY_ERROR));
        assert_eq!(executor.calls.lock()[0].args, vec!["vet", "."]);
    }

    #[tokio::test]
    async fn test_missing_linter_does_not_stop_vet_and_build() {
        let (context, _, dir) = context(&["go"], "");
        let checks = CheckRunner::new(context);
        let report = checks.check_on_save(&dir.path().join("a.go"), "package a\n").await;

        assert!(matches!(&report.lint, CheckOutcome::Failed(e) if e.missing_tool() == Some("golint")));
        assert!(matches!(report.vet, CheckOutcome::Completed(_)));
        assert!(matches!(report.build, CheckOutcome::Completed(_)));
    }

    #[test]
    fn test_collection_merges_sources() {
        let collection = DiagnosticCollection::new();
        collection.set(DiagnosticSource::Server, "file:///a.go", vec![diagnostic("server")]);
        collection.set(DiagnosticSource::Lint, "file:///a.go", vec![diagnostic("lint")]);
        assert_eq!(collection.get("file:///a.go").len(), 2);

        collection.replace_source(DiagnosticSource::Lint, BTreeMap::new());
        let remaining = collection.get("file:///a.go");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "server");

        collection.set(DiagnosticSource::Server, "file:///a.go", vec![]);
        assert!(collection.get("file:///a.go").is_empty());
    }
}
