//! Document links for import paths; needs no external tool

use async_trait::async_trait;
use gopherlink_config::Feature;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::FallbackProvider;
use crate::document::{position_at, FeatureRequest, Range};
use crate::error::Result;

pub const PACKAGE_DOCS_URL: &str = "https://pkg.go.dev";

static SINGLE_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).unwrap());
static BLOCK_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*(?:[\w.]+\s+)?"([^"]+)""#).unwrap());

/// Byte ranges of every imported path in `text`
pub(crate) fn import_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut in_block = false;
    let mut line_start = 0;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();
        let captured = if in_block {
            if trimmed.starts_with(')') {
                in_block = false;
                None
            } else {
                BLOCK_ENTRY.captures(content)
            }
        } else if trimmed.starts_with("import") && trimmed.trim_end().ends_with('(') {
            in_block = true;
            None
        } else {
            SINGLE_IMPORT.captures(content)
        };
        if let Some(path) = captured.and_then(|c| c.get(1)) {
            spans.push((line_start + path.start(), line_start + path.end()));
        }
        // imports end at the first top-level declaration
        if !in_block
            && ["func ", "type ", "var ", "const "]
                .iter()
                .any(|kw| trimmed.starts_with(kw))
        {
            break;
        }
        line_start += line.len();
    }
    spans
}

#[derive(Debug, Default)]
pub struct DocumentLinkProvider;

impl DocumentLinkProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FallbackProvider for DocumentLinkProvider {
    fn feature(&self) -> Feature {
        Feature::DocumentLink
    }

    fn tool(&self) -> Option<&str> {
        None
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let text = &request.text;
        Ok(Value::Array(
            import_spans(text)
                .into_iter()
                .map(|(start, end)| {
                    json!({
                        "range": Range::new(position_at(text, start), position_at(text, end)),
                        "target": format!("{}/{}", PACKAGE_DOCS_URL, &text[start..end]),
                    })
                })
                .collect(),
        ))
    }
}
