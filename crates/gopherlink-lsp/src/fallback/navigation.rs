//! Definition, type definition, references and implementation through godef and guru

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gopherlink_config::Feature;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{lines, FallbackProvider, ToolContext};
use crate::document::{file_uri, modified_archive, position_from_tool, FeatureRequest, Location, Range};
use crate::error::{BridgeError, Result};

const GODEF: &str = "godef";
const GURU: &str = "guru";

/// `file:line:col` or `file:line.col`, optionally followed by a span end
static TOOL_POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?):(\d+)[:.](\d+)(?:-\d+[:.]\d+)?$").unwrap());

/// Parse a tool position, tolerating drive letters and guru's span end
pub(crate) fn parse_tool_position(raw: &str) -> Option<(PathBuf, u32, u32)> {
    let caps = TOOL_POSITION.captures(raw.trim())?;
    let line = caps.get(2)?.as_str().parse().ok()?;
    let col = caps.get(3)?.as_str().parse().ok()?;
    Some((PathBuf::from(caps.get(1)?.as_str()), line, col))
}

/// Build a location, converting byte columns with the best text available
async fn location_for(request: &FeatureRequest, path: &Path, line: u32, col: u32) -> Result<Location> {
    let on_disk;
    let text = if path == request.path {
        Some(request.text.as_str())
    } else {
        on_disk = tokio::fs::read_to_string(path).await.ok();
        on_disk.as_deref()
    };
    let position = position_from_tool(text, line, col);
    Ok(Location {
        uri: file_uri(path)?,
        range: Range::at(position),
    })
}

async fn locations_for(request: &FeatureRequest, raw: &[&str]) -> Result<Vec<Location>> {
    let mut locations = Vec::new();
    for pos in raw {
        if let Some((path, line, col)) = parse_tool_position(pos) {
            let location = location_for(request, &path, line, col).await?;
            if !locations.contains(&location) {
                locations.push(location);
            }
        }
    }
    Ok(locations)
}

/// Run a guru mode in JSON output, returning every JSON value it printed
async fn guru(context: &ToolContext, mode: &str, request: &FeatureRequest) -> Result<Vec<Value>> {
    let offset = request.require_offset(GURU)?;
    let args = vec![
        "-json".to_string(),
        "-modified".to_string(),
        mode.to_string(),
        format!("{}:#{}", request.path.display(), offset),
    ];
    let archive = modified_archive(&request.path, &request.text);
    let output = context
        .run(GURU, args, Some(archive), &request.dir(), None)
        .await?;
    if !output.success() {
        tracing::debug!(mode, stderr = %output.stderr.trim(), "guru found nothing");
        return Ok(Vec::new());
    }
    serde_json::Deserializer::from_str(&output.stdout)
        .into_iter::<Value>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| BridgeError::tool_error(GURU, format!("unexpected output: {}", e)))
}

pub struct DefinitionProvider {
    context: Arc<ToolContext>,
}

impl DefinitionProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for DefinitionProvider {
    fn feature(&self) -> Feature {
        Feature::Definition
    }

    fn tool(&self) -> Option<&str> {
        Some(GODEF)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let offset = request.require_offset(GODEF)?;
        let args = vec![
            "-i".to_string(),
            "-f".to_string(),
            request.path.to_string_lossy().into_owned(),
            "-o".to_string(),
            offset.to_string(),
        ];
        let output = self
            .context
            .run(GODEF, args, Some(request.text.clone()), &request.dir(), None)
            .await?;
        if !output.success() {
            tracing::debug!(stderr = %output.stderr.trim(), "godef found no definition");
            return Ok(Value::Null);
        }
        let Some(first) = lines(&output.stdout).find(|l| !l.is_empty()) else {
            return Ok(Value::Null);
        };
        match parse_tool_position(first) {
            Some((path, line, col)) => {
                let location = location_for(request, &path, line, col).await?;
                Ok(serde_json::to_value(location)?)
            }
            None => Ok(Value::Null),
        }
    }
}

pub struct TypeDefinitionProvider {
    context: Arc<ToolContext>,
}

impl TypeDefinitionProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for TypeDefinitionProvider {
    fn feature(&self) -> Feature {
        Feature::TypeDefinition
    }

    fn tool(&self) -> Option<&str> {
        Some(GURU)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let values = guru(&self.context, "describe", request).await?;
        let positions: Vec<&str> = values
            .iter()
            .filter_map(|v| v.pointer("/value/typespos"))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|t| t.get("objpos").and_then(Value::as_str))
            .collect();
        let locations = locations_for(request, &positions).await?;
        Ok(match locations.into_iter().next() {
            Some(location) => serde_json::to_value(location)?,
            None => Value::Null,
        })
    }
}

pub struct ReferencesProvider {
    context: Arc<ToolContext>,
}

impl ReferencesProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for ReferencesProvider {
    fn feature(&self) -> Feature {
        Feature::References
    }

    fn tool(&self) -> Option<&str> {
        Some(GURU)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let values = guru(&self.context, "referrers", request).await?;
        let mut positions: Vec<&str> = Vec::new();
        for value in &values {
            if let Some(objpos) = value.get("objpos").and_then(Value::as_str) {
                positions.push(objpos);
            }
            if let Some(refs) = value.get("refs").and_then(Value::as_array) {
                positions.extend(refs.iter().filter_map(|r| r.get("pos").and_then(Value::as_str)));
            }
        }
        Ok(serde_json::to_value(locations_for(request, &positions).await?)?)
    }
}

pub struct ImplementationProvider {
    context: Arc<ToolContext>,
}

impl ImplementationProvider {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl FallbackProvider for ImplementationProvider {
    fn feature(&self) -> Feature {
        Feature::Implementation
    }

    fn tool(&self) -> Option<&str> {
        Some(GURU)
    }

    async fn provide(&self, request: &FeatureRequest) -> Result<Value> {
        let values = guru(&self.context, "implements", request).await?;
        let Some(result) = values.first() else {
            return Ok(json!([]));
        };
        // interfaces list their implementations under "to"; concrete types
        // list the interfaces they satisfy under "from"
        let related = ["to", "from", "fromptr"]
            .iter()
            .filter_map(|key| result.get(*key).and_then(Value::as_array))
            .find(|entries| !entries.is_empty());
        let positions: Vec<&str> = related
            .into_iter()
            .flatten()
            .filter_map(|e| e.get("pos").and_then(Value::as_str))
            .collect();
        Ok(serde_json::to_value(locations_for(request, &positions).await?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Position;
    use crate::fallback::test_support::context;

    const SRC: &str = "package a\n\nfunc héllo() {}\n\nvar x = héllo\n";

    fn request() -> FeatureRequest {
        FeatureRequest::for_document("/src/a.go", SRC)
            .unwrap()
            .at(Position::new(4, 9))
    }

    #[test]
    fn test_parse_tool_position() {
        assert_eq!(
            parse_tool_position("/src/a.go:3:6"),
            Some((PathBuf::from("/src/a.go"), 3, 6))
        );
        assert_eq!(
            parse_tool_position("C:\\src\\a.go:3:6"),
            Some((PathBuf::from("C:\\src\\a.go"), 3, 6))
        );
        assert_eq!(
            parse_tool_position("/src/a.go:3:6-3:11"),
            Some((PathBuf::from("/src/a.go"), 3, 6))
        );
        assert_eq!(
            parse_tool_position("/src/a.go:12.4-12.9"),
            Some((PathBuf::from("/src/a.go"), 12, 4))
        );
        assert_eq!(parse_tool_position("no position here"), None);
    }

    #[tokio::test]
    async fn test_definition_converts_byte_columns() {
        let (context, executor, _dir) = context(&["godef"], "/src/a.go:3:6\n");
        let value = DefinitionProvider::new(context)
            .provide(&request())
            .await
            .unwrap();

        assert_eq!(value["uri"], "file:///src/a.go");
        assert_eq!(value["range"]["start"], json!({ "line": 2, "character": 5 }));
        let calls = executor.calls.lock();
        assert_eq!(calls[0].args, vec!["-i", "-f", "/src/a.go", "-o", "38"]);
        assert_eq!(calls[0].stdin.as_deref(), Some(SRC));
    }

    #[tokio::test]
    async fn test_references_from_json_stream() {
        let stream = r#"{"objpos":"/src/a.go:3:6","desc":"func héllo"}
{"package":"a","refs":[{"pos":"/src/a.go:5:9","text":"var x = héllo"}]}"#;
        let (context, executor, _dir) = context(&["guru"], stream);
        let value = ReferencesProvider::new(context)
            .provide(&request())
            .await
            .unwrap();

        let locations = value.as_array().unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[1]["range"]["start"]["character"], 8);
        assert_eq!(executor.calls.lock()[0].args[2], "referrers");
    }

    #[tokio::test]
    async fn test_references_accept_span_positions() {
        let stream = r#"{"objpos":"/src/a.go:3:6-3:11","desc":"func héllo"}"#;
        let (context, _, _dir) = context(&["guru"], stream);
        let value = ReferencesProvider::new(context)
            .provide(&request())
            .await
            .unwrap();

        let locations = value.as_array().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0]["range"]["start"], json!({ "line": 2, "character": 5 }));
    }

    #[tokio::test]
    async fn test_implementation_without_results_is_empty_list() {
        let (context, _, _dir) = context(&["guru"], r#"{"type":{"name":"a.T","pos":"/src/a.go:3:6","kind":"struct"}}"#);
        let value = ImplementationProvider::new(context)
            .provide(&request())
            .await
            .unwrap();
        assert_eq!(value, json!([]));
    }
}
