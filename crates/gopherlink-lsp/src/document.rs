//! Document positions, editor-facing value types and feature requests

use std::path::{Path, PathBuf};

use gopherlink_config::Feature;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::{BridgeError, Result};

/// Zero-based line and UTF-16 column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty range at `position`
    pub fn at(position: Position) -> Self {
        Self::new(position, position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

pub const SEVERITY_ERROR: u8 = 1;
pub const SEVERITY_WARNING: u8 = 2;

/// A diagnostic in LSP shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub message: String,
}

/// Byte offset of `position` in `text`, clamped to the line end
pub fn offset_at(text: &str, position: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..position.line {
        match text[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return text.len(),
        }
    }
    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |i| line_start + i);

    let mut units = 0u32;
    for (i, c) in text[line_start..line_end].char_indices() {
        if units >= position.character {
            return line_start + i;
        }
        units += c.len_utf16() as u32;
    }
    line_end
}

/// Position of byte `offset` in `text`
pub fn position_at(text: &str, offset: usize) -> Position {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let character = before[line_start..].encode_utf16().count() as u32;
    Position::new(line, character)
}

/// Position from a 1-based line and 1-based byte column, as Go tools print them
pub fn position_from_tool(text: Option<&str>, line: u32, column: u32) -> Position {
    let line0 = line.saturating_sub(1);
    let col0 = column.saturating_sub(1);
    let Some(text) = text else {
        return Position::new(line0, col0);
    };
    match text.split('\n').nth(line0 as usize) {
        Some(content) => {
            let mut byte = (col0 as usize).min(content.len());
            while !content.is_char_boundary(byte) {
                byte -= 1;
            }
            Position::new(line0, content[..byte].encode_utf16().count() as u32)
        }
        None => Position::new(line0, col0),
    }
}

pub fn file_uri(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|_| BridgeError::protocol(format!("Not an absolute path: {}", path.display())))
}

pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .ok_or_else(|| BridgeError::protocol(format!("Not a file URI: {}", uri)))
}

/// The `-modified` archive format: name, byte length, contents
pub fn modified_archive(path: &Path, text: &str) -> String {
    format!("{}\n{}\n{}", path.display(), text.len(), text)
}

/// Everything a provider needs to answer one request
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRequest {
    pub uri: String,
    pub path: PathBuf,
    /// Current buffer contents, saved or not
    pub text: String,
    pub position: Option<Position>,
    pub new_name: Option<String>,
    pub query: Option<String>,
    pub workspace_root: Option<PathBuf>,
    /// The buffer has unsaved changes
    pub modified: bool,
}

impl FeatureRequest {
    pub fn for_document(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self> {
        let path = path.into();
        Ok(Self {
            uri: file_uri(&path)?,
            path,
            text: text.into(),
            position: None,
            new_name: None,
            query: None,
            workspace_root: None,
            modified: false,
        })
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_new_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn in_workspace(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn modified(mut self, modified: bool) -> Self {
        self.modified = modified;
        self
    }

    /// Byte offset of the cursor
    pub fn byte_offset(&self) -> Option<usize> {
        self.position.map(|p| offset_at(&self.text, p))
    }

    /// Byte offset of the cursor, or an error naming the tool that needed it
    pub fn require_offset(&self, tool: &str) -> Result<usize> {
        self.byte_offset()
            .ok_or_else(|| BridgeError::tool_error(tool, "request has no cursor position"))
    }

    /// Directory tools should run in
    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// LSP params for forwarding `feature` to the server
    pub fn to_lsp_params(&self, feature: Feature) -> Value {
        let document = json!({ "uri": self.uri });
        let position = self.position.unwrap_or_default();
        match feature {
            Feature::WorkspaceSymbols => json!({ "query": self.query.clone().unwrap_or_default() }),
            Feature::Formatting => json!({
                "textDocument": document,
                "options": { "tabSize": 8, "insertSpaces": false },
            }),
            Feature::DocumentSymbols | Feature::DocumentLink | Feature::Diagnostics => {
                json!({ "textDocument": document })
            }
            Feature::References => json!({
                "textDocument": document,
                "position": position,
                "context": { "includeDeclaration": true },
            }),
            Feature::Rename => json!({
                "textDocument": document,
                "position": position,
                "newName": self.new_name.clone().unwrap_or_default(),
            }),
            Feature::Completion
            | Feature::Definition
            | Feature::TypeDefinition
            | Feature::Hover
            | Feature::SignatureHelp
            | Feature::Implementation => json!({
                "textDocument": document,
                "position": position,
            }),
        }
    }
}
