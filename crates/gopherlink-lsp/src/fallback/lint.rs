//! Pull diagnostics from the configured linter

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{lines, FallbackProvider, ToolContext};
use crate::document::{position_from_tool, Diagnostic, FeatureRequest, Range, SEVERITY_WARNING};
use crate::error::Result;

static DIAGNOSTIC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?):(\d+)(?::(\d+))?:\s*(.+)$").unwrap());

/// One `file:line[:col]: message` line of tool output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDiagnostic {
    /// Absolute, joined onto the directory the tool ran in when relative
    pub path: PathBuf,
    /// 1-based
    pub line: u32,
    /// 1-based byte column; 1 when the tool printed none
    pub column: u32,
    pub message: String,
}

impl ToolDiagnostic {
    pub fn to_diagnostic(&self, text: Option<&str>, severity: u8, source: &str) -> Diagnostic {
        Diagnostic {
            range: Range::at(position_from_tool(text, self.line, self.column)),
            severity: Some(severity),
            source: Some(source.to_string()),
            message: self.message.clone(),
        }
    }
}

/// Parse the compiler-style output shared by golint, go vet and go build
pub fn parse_tool_diagnostics(output: &str, cwd: &Path) -> Vec<ToolDiagnostic> {
    lines(output)
        .filter(|l| !l.starts_with('#'))
        .filter_map(|l| DIAGNOSTIC_LINE.captures(l))
        .filter_map(|caps| {
            let file = Path::new(caps.get(1)?.as_str());
            let path = if file.is_absolute() {
                file.to_path_buf()
            } else {
                cwd.join(file.strip_prefix("./").unwrap_or(file))
            };
            Some(ToolDiagnostic {
                path,
                line: caps.get(2)?.as_str().parse().ok()?,
                column: caps
                    .get(3)
                    .and_then(|c| c.as_str().parse().ok())
                    .unwrap_or(1),
                message: caps.get(4)?.as_str().trim().to_string(),
            })
        })
        .collect()
}

pub struct LintProvider {
    context: Arc<ToolContext>,
}

impl LintProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }

    fn linter(&self) -> &str {
        &self.context.config().lint_tool
    }
}

#[async_trait]
impl FallbackProvider for LintProvider {
    fn feature(&self) -> Feature {
        Feature::Diagnostics
    }

    fn tool(&self) -> Option<&str> {
        Some(self.linter())
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let linter = self.linter().to_string();
        let mut args = self.context.config().tool_flags.lint.clone();
        args.push(request.path.to_string_lossy().into_owned());

        let dir = request.dir();
        // linters exit non-zero when they report problems
        let output = self.context.run(&linter, args, None, &dir, None).await?;
        let diagnostics: Vec<Diagnostic> = parse_tool_diagnostics(&output.combined(), &dir)
            .into_iter()
            .filter(|d| d.path == request.path)
            .map(|d| d.to_diagnostic(Some(&request.text), SEVERITY_WARNING, &linter))
            .collect();
        Ok(serde_json::to_value(diagnostics)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::test_support::context;
    use crate::document::Position;

    #[test]
    fn test_parses_relative_and_columnless_lines() {
        let output = "# example.com/a\n./a.go:3:6: exported function Hello should have comment\nb.go:7: unreachable code\nnot a diagnostic\n";
        let parsed = parse_tool_diagnostics(output, Path::new("/src"));

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].path, PathBuf::from("/src/a.go"));
        assert_eq!((parsed[0].line, parsed[0].column), (3, 6));
        assert_eq!(parsed[1].path, PathBuf::from("/src/b.go"));
        assert_eq!(parsed[1].column, 1);
        assert_eq!(parsed[1].message, "unreachable code");
    }

    #[tokio::test]
    async fn test_lint_keeps_only_this_document() {
        let (context, executor, _dir) = context(
            &["golint"],
            "/src/a.go:1:1: package comment should be of the form \"Package a ...\"\n/src/b.go:2:1: other\n",
        );
        let request = FeatureRequest::for_document("/src/a.go", "package a\n").unwrap();

        let value = LintProvider::new(context).provide(&request).await.unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["source"], "golint");
        assert_eq!(items[0]["severity"], SEVERITY_WARNING);
        assert_eq!(items[0]["range"]["start"], serde_json::to_value(Position::new(0, 0)).unwrap());
        assert_eq!(executor.calls.lock()[0].args, vec!["/src/a.go"]);
    }
}
