//! Document and workspace symbols through go-outline and go-symbols

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{FallbackProvider, ToolContext};
use crate::document::{
    file_uri, modified_archive, position_at, FeatureRequest, Location, Position, Range,
};
use crate::error::{BridgeError, Result};

const OUTLINE: &str = "go-outline";
const SYMBOLS: &str = "go-symbols";

// LSP SymbolKind values
const KIND_PACKAGE: u8 = 4;
const KIND_METHOD: u8 = 6;
const KIND_INTERFACE: u8 = 11;
const KIND_FUNCTION: u8 = 12;
const KIND_VARIABLE: u8 = 13;
const KIND_CONSTANT: u8 = 14;
const KIND_STRUCT: u8 = 23;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlineDecl {
    label: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    receiver_type: String,
    /// 1-based byte offsets
    start: usize,
    end: usize,
    #[serde(default)]
    children: Vec<OutlineDecl>,
}

fn outline_kind(decl: &OutlineDecl) -> Option<u8> {
    match decl.kind.as_str() {
        "package" => Some(KIND_PACKAGE),
        "function" if !decl.receiver_type.is_empty() => Some(KIND_METHOD),
        "function" => Some(KIND_FUNCTION),
        "variable" => Some(KIND_VARIABLE),
        "constant" => Some(KIND_CONSTANT),
        "type" => Some(KIND_STRUCT),
        _ => None,
    }
}

fn document_symbol(text: &str, decl: &OutlineDecl) -> Option<Value> {
    let kind = outline_kind(decl)?;
    let range = Range::new(
        position_at(text, decl.start.saturating_sub(1)),
        position_at(text, decl.end.saturating_sub(1)),
    );
    let mut symbol = json!({
        "name": decl.label,
        "kind": kind,
        "range": range,
        "selectionRange": range,
    });
    if !decl.receiver_type.is_empty() {
        symbol["detail"] = json!(format!("({})", decl.receiver_type));
    }
    let children: Vec<Value> = decl
        .children
        .iter()
        .filter_map(|c| document_symbol(text, c))
        .collect();
    if !children.is_empty() {
        symbol["children"] = Value::Array(children);
    }
    Some(symbol)
}

/// Convert go-outline JSON to document symbols; imports are left out
pub(crate) fn parse_outline(text: &str, stdout: &str) -> Result<Value> {
    let decls: Vec<OutlineDecl> = serde_json::from_str(stdout.trim())
        .map_err(|e| BridgeError::tool_error(OUTLINE, format!("unexpected output: {}", e)))?;
    Ok(Value::Array(
        decls
            .iter()
            .filter_map(|d| document_symbol(text, d))
            .collect(),
    ))
}

pub struct DocumentSymbolProvider {
    context: Arc<ToolContext>,
}

impl DocumentSymbolProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for DocumentSymbolProvider {
    fn feature(&self) -> Feature {
        Feature::DocumentSymbols
    }

    fn tool(&self) -> Option<&str> {
        Some(OUTLINE)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let mut args = vec!["-f".to_string(), request.path.to_string_lossy().into_owned()];
        let mut stdin = None;
        if request.modified {
            args.push("-modified".to_string());
            stdin = Some(modified_archive(&request.path, &request.text));
        }
        let output = self
            .context
            .run_checked(OUTLINE, args, stdin, &request.dir())
            .await?;
        parse_outline(&request.text, &output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct WorkspaceDecl {
    name: String,
    kind: String,
    #[serde(default)]
    package: String,
    path: PathBuf,
    /// 0-based
    line: u32,
    character: u32,
}

fn workspace_kind(kind: &str) -> u8 {
    match kind {
        "func" => KIND_FUNCTION,
        "method" => KIND_METHOD,
        "const" => KIND_CONSTANT,
        "type" | "struct" => KIND_STRUCT,
        "interface" => KIND_INTERFACE,
        _ => KIND_VARIABLE,
    }
}

/// Convert go-symbols JSON to symbol information
pub(crate) fn parse_workspace_symbols(stdout: &str) -> Result<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(json!([]));
    }
    let decls: Vec<WorkspaceDecl> = serde_json::from_str(trimmed)
        .map_err(|e| BridgeError::tool_error(SYMBOLS, format!("unexpected output: {}", e)))?;

    let mut symbols = Vec::with_capacity(decls.len());
    for decl in decls {
        let location = Location {
            uri: file_uri(&decl.path)?,
            range: Range::at(Position::new(decl.line, decl.character)),
        };
        symbols.push(json!({
            "name": decl.name,
            "kind": workspace_kind(&decl.kind),
            "location": location,
            "containerName": decl.package,
        }));
    }
    Ok(Value::Array(symbols))
}

pub struct WorkspaceSymbolProvider {
    context: Arc<ToolContext>,
}

impl WorkspaceSymbolProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for WorkspaceSymbolProvider {
    fn feature(&self) -> Feature {
        Feature::WorkspaceSymbols
    }

    fn tool(&self) -> Option<&str> {
        Some(SYMBOLS)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let root = request.workspace_root.clone().unwrap_or_else(|| request.dir());
        let args = vec![
            root.to_string_lossy().into_owned(),
            request.query.clone().unwrap_or_default(),
        ];
        let output = self.context.run_checked(SYMBOLS, args, None, &root).await?;
        parse_workspace_symbols(&output.stdout)
    }
}
