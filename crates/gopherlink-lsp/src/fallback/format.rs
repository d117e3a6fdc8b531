//! Formatting through the configured formatter

use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use serde_json::Value;
use similar::{DiffOp, TextDiff};

use super::{FallbackProvider, ToolContext};
use crate::document::{FeatureRequest, Position, Range, TextEdit};
use crate::error::Result;

/// Formatters that resolve imports relative to `-srcdir`
const SRCDIR_AWARE: &[&str] = &["goimports", "goreturns"];

pub struct FormattingProvider {
    context: Arc<ToolContext>,
}

impl FormattingProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }

    fn formatter(&self) -> &str {
        &self.context.config().format_tool
    }
}

/// Line-granular edits turning `old` into `new`
pub(crate) fn line_edits(old: &str, new: &str) -> Vec<TextEdit> {
    let diff = TextDiff::from_lines(old, new);
    let new_lines = diff.new_slices();

    diff.ops()
        .iter()
        .filter_map(|op| {
            let (old_index, old_len, new_index, new_len) = match *op {
                DiffOp::Equal { .. } => return None,
                DiffOp::Delete {
                    old_index,
                    old_len,
                    new_index,
                } => (old_index, old_len, new_index, 0),
                DiffOp::Insert {
                    old_index,
                    new_index,
                    new_len,
                } => (old_index, 0, new_index, new_len),
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => (old_index, old_len, new_index, new_len),
            };
            Some(TextEdit {
                range: Range::new(
                    Position::new(old_index as u32, 0),
                    Position::new((old_index + old_len) as u32, 0),
                ),
                new_text: new_lines[new_index..new_index + new_len].concat(),
            })
        })
        .collect()
}

#[async_trait]
impl FallbackProvider for FormattingProvider {
    fn feature(&self) -> Feature {
        Feature::Formatting
    }

    fn tool(&self) -> Option<&str> {
        Some(self.formatter())
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let formatter = self.formatter().to_string();
        let mut args = self.context.config().tool_flags.format.clone();
        if SRCDIR_AWARE.contains(&formatter.as_str()) {
            args.push("-srcdir".to_string());
            args.push(request.path.to_string_lossy().into_owned());
        }

        let output = self
            .context
            .run_checked(&formatter, args, Some(request.text.clone()), &request.dir())
            .await?;
        Ok(serde_json::to_value(line_edits(&request.text, &output.stdout))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::test_support::{context, context_with};
    use gopherlink_config::ExtensionConfig;
    use serde_json::json;

    #[test]
    fn test_edits_replace_changed_lines_only() {
        let old = "package a\nfunc  f(){\n}\n";
        let new = "package a\n\nfunc f() {\n}\n";
        let edits = line_edits(old, new);

        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range.start, Position::new(1, 0));
        assert_eq!(edits[0].range.end, Position::new(2, 0));
        assert_eq!(edits[0].new_text, "\nfunc f() {\n");
    }

    #[test]
    fn test_formatted_input_needs_no_edits() {
        assert!(line_edits("package a\n", "package a\n").is_empty());
    }

    #[tokio::test]
    async fn test_goreturns_gets_srcdir() {
        let (context, executor, _dir) = context(&["goreturns"], "package a\n");
        let request = FeatureRequest::for_document("/src/a.go", "package  a\n").unwrap();

        let edits = FormattingProvider::new(context)
            .provide(&request)
            .await
            .unwrap();
        assert_eq!(edits[0]["newText"], json!("package a\n"));
        assert_eq!(executor.calls.lock()[0].args, vec!["-srcdir", "/src/a.go"]);
    }

    #[tokio::test]
    async fn test_gofmt_uses_configured_flags() {
        let mut config = ExtensionConfig {
            format_tool: "gofmt".to_string(),
            ..Default::default()
        };
        config.tool_flags.format = vec!["-s".to_string()];
        let (context, executor, _dir) = context_with(&["gofmt"], "package a\n", config);
        let request = FeatureRequest::for_document("/src/a.go", "package a\n").unwrap();

        let provider = FormattingProvider::new(context);
        assert_eq!(provider.tool(), Some("gofmt"));
        assert_eq!(provider.provide(&request).await.unwrap(), json!([]));
        assert_eq!(executor.calls.lock()[0].args, vec!["-s"]);
    }
}
