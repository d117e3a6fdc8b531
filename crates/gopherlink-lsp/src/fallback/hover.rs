//! Hover and signature help through gogetdoc

use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{FallbackProvider, ToolContext};
use crate::document::{modified_archive, FeatureRequest};
use crate::error::{BridgeError, Result};

const TOOL: &str = "gogetdoc";

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DocInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub decl: String,
    #[serde(default)]
    pub doc: String,
}

/// Ask gogetdoc about the identifier at byte `offset`; None when it finds nothing
async fn describe(
    context: &ToolContext,
    request: &FeatureRequest,
    offset: usize,
) -> Result<Option<DocInfo>> {
    let args = vec![
        "-u".to_string(),
        "-json".to_string(),
        "-modified".to_string(),
        "-pos".to_string(),
        format!("{}:#{}", request.path.display(), offset),
    ];
    let archive = modified_archive(&request.path, &request.text);
    let output = context
        .run(TOOL, args, Some(archive), &request.dir(), None)
        .await?;
    if !output.success() {
        // gogetdoc exits non-zero when there is no identifier under the cursor
        tracing::debug!(stderr = %output.stderr.trim(), "gogetdoc found nothing");
        return Ok(None);
    }
    let info: DocInfo = serde_json::from_str(output.stdout.trim())
        .map_err(|e| BridgeError::tool_error(TOOL, format!("unexpected output: {}", e)))?;
    Ok(Some(info))
}

pub struct HoverProvider {
    context: Arc<ToolContext>,
}

impl HoverProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

pub(crate) fn hover_contents(info: &DocInfo) -> Value {
    let mut value = format!("```go\n{}\n```", info.decl.trim());
    if !info.doc.trim().is_empty() {
        value.push('\n');
        value.push_str(info.doc.trim());
    }
    json!({ "contents": { "kind": "markdown", "value": value } })
}

#[async_trait]
impl FallbackProvider for HoverProvider {
    fn feature(&self) -> Feature {
        Feature::Hover
    }

    fn tool(&self) -> Option<&str> {
        Some(TOOL)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let offset = request.require_offset(TOOL)?;
        Ok(match describe(&self.context, request, offset).await? {
            Some(info) if !info.decl.is_empty() => hover_contents(&info),
            _ => Value::Null,
        })
    }
}

/// Call site enclosing a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallSite {
    /// Byte offset of the opening parenthesis
    pub open_paren: usize,
    pub active_parameter: usize,
}

/// Walk back from `offset` to the unmatched `(` of the enclosing call
pub(crate) fn enclosing_call(text: &str, offset: usize) -> Option<CallSite> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut i = offset.min(bytes.len());
    while i > 0 {
        i -= 1;
        match bytes[i] {
            b')' | b']' => depth += 1,
            b'(' if depth == 0 => {
                return Some(CallSite {
                    open_paren: i,
                    active_parameter: commas,
                })
            }
            b'(' | b'[' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => commas += 1,
            b'{' | b'}' | b';' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}

/// Split a declaration like `func (r *T) Name(a int, b string) error`
/// into its label and parameter labels
pub(crate) fn split_signature(decl: &str) -> Option<(String, Vec<String>)> {
    let rest = decl.trim().strip_prefix("func")?.trim_start();
    let rest = if rest.starts_with('(') {
        let close = matching_paren(rest, 0)?;
        rest[close + 1..].trim_start()
    } else {
        rest
    };
    let open = rest.find('(')?;
    let close = matching_paren(rest, open)?;
    let params = &rest[open + 1..close];

    let mut labels = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                labels.push(params[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if !params[start..].trim().is_empty() {
        labels.push(params[start..].trim().to_string());
    }
    Some((rest.to_string(), labels))
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

pub struct SignatureHelpProvider {
    context: Arc<ToolContext>,
}

impl SignatureHelpProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for SignatureHelpProvider {
    fn feature(&self) -> Feature {
        Feature::SignatureHelp
    }

    fn tool(&self) -> Option<&str> {
        Some(TOOL)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let offset = request.require_offset(TOOL)?;
        let Some(call) = enclosing_call(&request.text, offset) else {
            return Ok(Value::Null);
        };
        if call.open_paren == 0 {
            return Ok(Value::Null);
        }
        let Some(info) = describe(&self.context, request, call.open_paren - 1).await? else {
            return Ok(Value::Null);
        };
        let Some((label, params)) = split_signature(&info.decl) else {
            return Ok(Value::Null);
        };

        let active = call.active_parameter.min(params.len().saturating_sub(1));
        Ok(json!({
            "signatures": [{
                "label": label,
                "documentation": info.doc.trim(),
                "parameters": params.iter().map(|p| json!({ "label": p })).collect::<Vec<_>>(),
            }],
            "activeSignature": 0,
            "activeParameter": active,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Position;
    use crate::fallback::test_support::context;

    const DOC: &str = r#"{"name":"Println","import":"fmt","decl":"func Println(a ...interface{}) (n int, err error)","doc":"Println formats using the default formats.\n"}"#;

    #[test]
    fn test_enclosing_call_counts_top_level_commas() {
        let text = "fmt.Printf(\"%d\", f(1, 2), ";
        let site = enclosing_call(text, text.len()).unwrap();
        assert_eq!(site.open_paren, 10);
        assert_eq!(site.active_parameter, 2);

        assert!(enclosing_call("x := 1; y", 9).is_none());
    }

    #[test]
    fn test_split_signature_skips_receiver() {
        let (label, params) =
            split_signature("func (s *Server) Serve(l net.Listener, opts ...func(o *Opt)) error").unwrap();
        assert_eq!(label, "Serve(l net.Listener, opts ...func(o *Opt)) error");
        assert_eq!(params, vec!["l net.Listener", "opts ...func(o *Opt)"]);

        let (_, none) = split_signature("func Now() time.Time").unwrap();
        assert!(none.is_empty());
        assert!(split_signature("var x int").is_none());
    }

    #[tokio::test]
    async fn test_hover_renders_markdown() {
        let (context, executor, _dir) = context(&["gogetdoc"], DOC);
        let request = FeatureRequest::for_document("/src/a.go", "fmt.Println()")
            .unwrap()
            .at(Position::new(0, 6));

        let hover = HoverProvider::new(context).provide(&request).await.unwrap();
        let value = hover["contents"]["value"].as_str().unwrap();
        assert!(value.starts_with("```go\nfunc Println"));
        assert!(value.ends_with("default formats."));

        let calls = executor.calls.lock();
        assert_eq!(calls[0].args[4], "/src/a.go:#6");
        assert!(calls[0].stdin.as_deref().unwrap().starts_with("/src/a.go\n13\n"));
    }

    #[tokio::test]
    async fn test_signature_help_queries_callee() {
        let (context, executor, _dir) = context(&["gogetdoc"], DOC);
        let request = FeatureRequest::for_document("/src/a.go", "fmt.Println(a, ")
            .unwrap()
            .at(Position::new(0, 15));

        let help = SignatureHelpProvider::new(context)
            .provide(&request)
            .await
            .unwrap();
        assert_eq!(help["activeParameter"], 0);
        assert_eq!(help["signatures"][0]["parameters"][0]["label"], "a ...interface{}");
        assert_eq!(executor.calls.lock()[0].args[4], "/src/a.go:#10");
    }
}
