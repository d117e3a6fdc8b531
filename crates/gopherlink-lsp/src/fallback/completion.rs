//! Completion through gocode

use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{FallbackProvider, ToolContext};
use crate::document::FeatureRequest;
use crate::error::{BridgeError, Result};

const TOOL: &str = "gocode";

// LSP CompletionItemKind values
const KIND_FUNCTION: u8 = 3;
const KIND_VARIABLE: u8 = 6;
const KIND_CLASS: u8 = 7;
const KIND_INTERFACE: u8 = 8;
const KIND_MODULE: u8 = 9;
const KIND_TEXT: u8 = 1;
const KIND_CONSTANT: u8 = 21;
const KIND_STRUCT: u8 = 22;

#[derive(Debug, Deserialize)]
struct Candidate {
    class: String,
    name: String,
    #[serde(default, rename = "type")]
    ty: String,
}

pub struct CompletionProvider {
    context: Arc<ToolContext>,
}

impl CompletionProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

fn kind_for(class: &str, ty: &str) -> u8 {
    match class {
        "func" => KIND_FUNCTION,
        "var" => KIND_VARIABLE,
        "const" => KIND_CONSTANT,
        "package" => KIND_MODULE,
        "type" if ty == "struct" => KIND_STRUCT,
        "type" if ty == "interface" => KIND_INTERFACE,
        "type" => KIND_CLASS,
        _ => KIND_TEXT,
    }
}

/// Turn gocode's `[prefix_len, [candidates]]` into completion items
pub(crate) fn parse_candidates(stdout: &str) -> Result<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(json!([]));
    }
    let raw: Value = serde_json::from_str(trimmed)
        .map_err(|e| BridgeError::tool_error(TOOL, format!("unexpected output: {}", e)))?;
    let Some(candidates) = raw.get(1) else {
        return Ok(json!([]));
    };
    let candidates: Vec<Candidate> = serde_json::from_value(candidates.clone())?;

    Ok(Value::Array(
        candidates
            .into_iter()
            .map(|c| {
                let mut item = json!({
                    "label": c.name,
                    "kind": kind_for(&c.class, &c.ty),
                });
                if !c.ty.is_empty() {
                    item["detail"] = json!(c.ty);
                }
                item
            })
            .collect(),
    ))
}

#[async_trait]
impl FallbackProvider for CompletionProvider {
    fn feature(&self) -> Feature {
        Feature::Completion
    }

    fn tool(&self) -> Option<&str> {
        Some(TOOL)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let offset = request.require_offset(TOOL)?;
        // the `c` prefix makes gocode read a character offset
        let chars = request.text[..offset].chars().count();
        let args = vec![
            "-f=json".to_string(),
            "autocomplete".to_string(),
            request.path.to_string_lossy().into_owned(),
            format!("c{}", chars),
        ];
        let output = self
            .context
            .run_checked(TOOL, args, Some(request.text.clone()), &request.dir())
            .await?;
        parse_candidates(&output.stdout)
    }
}
