//! Rename through gorename's diff output

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{FallbackProvider, ToolContext};
use crate::document::{file_uri, FeatureRequest, Position, Range, TextEdit};
use crate::error::{BridgeError, Result};

const TOOL: &str = "gorename";

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap());

/// Edits for one file of a unified diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdits {
    pub path: PathBuf,
    pub edits: Vec<TextEdit>,
}

fn header_path(line: &str) -> PathBuf {
    let name = line.split('\t').next().unwrap_or(line).trim();
    let name = name.strip_suffix(".orig").unwrap_or(name);
    PathBuf::from(name)
}

/// Turn a unified diff into whole-line replacements, one per hunk
pub fn parse_unified_diff(diff: &str) -> Result<Vec<FileEdits>> {
    let mut files: Vec<FileEdits> = Vec::new();
    let mut lines = diff.lines().peekable();

    while let Some(line) = lines.next() {
        if let Some(old) = line.strip_prefix("--- ") {
            files.push(FileEdits {
                path: header_path(old),
                edits: Vec::new(),
            });
            continue;
        }
        let Some(caps) = HUNK_HEADER.captures(line) else {
            continue;
        };
        let file = files
            .last_mut()
            .ok_or_else(|| BridgeError::tool_error(TOOL, "diff hunk before any file header"))?;

        let number = |i: usize, default: u32| -> u32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(default)
        };
        let old_start = number(1, 1);
        let old_count = number(2, 1);

        let mut new_text = String::new();
        while let Some(body) = lines.peek() {
            if let Some(kept) = body.strip_prefix(' ').or_else(|| body.strip_prefix('+')) {
                new_text.push_str(kept);
                new_text.push('\n');
            } else if !body.starts_with('-') && !body.starts_with('\\') {
                break;
            }
            lines.next();
        }

        // a zero-length old range names the line *after* which lines are inserted
        let first = if old_count == 0 { old_start } else { old_start.saturating_sub(1) };
        file.edits.push(TextEdit {
            range: Range::new(Position::new(first, 0), Position::new(first + old_count, 0)),
            new_text,
        });
    }

    files.retain(|f| !f.edits.is_empty());
    Ok(files)
}

pub struct RenameProvider {
    context: Arc<ToolContext>,
}

impl RenameProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for RenameProvider {
    fn feature(&self) -> Feature {
        Feature::Rename
    }

    fn tool(&self) -> Option<&str> {
        Some(TOOL)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let offset = request.require_offset(TOOL)?;
        let Some(new_name) = request.new_name.as_deref().filter(|n| !n.is_empty()) else {
            return Ok(Value::Null);
        };
        if request.modified {
            return Err(BridgeError::tool_error(
                TOOL,
                "the file has unsaved changes; save it before renaming",
            ));
        }

        let args = vec![
            "-d".to_string(),
            "-offset".to_string(),
            format!("{}:#{}", request.path.display(), offset),
            "-to".to_string(),
            new_name.to_string(),
        ];
        let output = self
            .context
            .run_checked(TOOL, args, None, &request.dir())
            .await?;

        let mut changes = BTreeMap::new();
        for file in parse_unified_diff(&output.stdout)? {
            changes.insert(file_uri(&file.path)?, file.edits);
        }
        Ok(json!({ "changes": changes }))
    }
}
