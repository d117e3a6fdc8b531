//! Capability exchange during `initialize`

use std::collections::BTreeSet;
use std::path::Path;

use gopherlink_config::Feature;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Client capabilities sent with `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_document: Option<TextDocumentClientCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceClientCapabilities>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synchronization: Option<SynchronizationCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover: Option<HoverCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_diagnostics: Option<PublishDiagnosticsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_symbol: Option<DocumentSymbolCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_save: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub will_save: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_item: Option<CompletionItemCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItemCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet_support: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_format: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishDiagnosticsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_information: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbolCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchical_document_symbol_support: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_folders: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<bool>,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            text_document: Some(TextDocumentClientCapabilities {
                synchronization: Some(SynchronizationCapability {
                    did_save: Some(true),
                    will_save: Some(false),
                }),
                completion: Some(CompletionCapability {
                    completion_item: Some(CompletionItemCapability {
                        snippet_support: Some(false),
                    }),
                }),
                hover: Some(HoverCapability {
                    content_format: Some(vec!["markdown".to_string(), "plaintext".to_string()]),
                }),
                publish_diagnostics: Some(PublishDiagnosticsCapability {
                    related_information: Some(true),
                }),
                document_symbol: Some(DocumentSymbolCapability {
                    hierarchical_document_symbol_support: Some(true),
                }),
            }),
            workspace: Some(WorkspaceClientCapabilities {
                workspace_folders: Some(true),
                configuration: Some(true),
            }),
        }
    }
}

/// Build `initialize` params for a workspace
pub fn initialize_params(process_id: Option<u32>, root: Option<&Path>) -> Value {
    let root_uri = root.and_then(|p| url::Url::from_directory_path(p).ok());
    let mut params = json!({
        "processId": process_id,
        "rootUri": root_uri.as_ref().map(|u| u.as_str()),
        "capabilities": ClientCapabilities::default(),
        "clientInfo": {
            "name": "gopherlink",
            "version": env!("CARGO_PKG_VERSION"),
        },
    });
    if let (Some(root), Some(uri)) = (root, root_uri) {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        params["workspaceFolders"] = json!([{ "uri": uri.as_str(), "name": name }]);
    }
    params
}

/// What the server advertised in its `initialize` result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_document_sync: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_help_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_definition_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_symbol_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_symbol_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_formatting_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_link_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_provider: Option<Value>,
}

impl ServerCapabilities {
    /// Read `capabilities` out of an `initialize` result; absent or malformed
    /// capabilities read as empty.
    pub fn from_initialize_result(result: &Value) -> Self {
        result
            .get("capabilities")
            .filter(|c| c.is_object())
            .and_then(|c| serde_json::from_value(c.clone()).ok())
            .unwrap_or_default()
    }

    pub fn provider(&self, feature: Feature) -> Option<&Value> {
        let slot = match feature {
            Feature::Completion => &self.completion_provider,
            Feature::Diagnostics => &self.diagnostic_provider,
            Feature::Formatting => &self.document_formatting_provider,
            Feature::Definition => &self.definition_provider,
            Feature::TypeDefinition => &self.type_definition_provider,
            Feature::Hover => &self.hover_provider,
            Feature::References => &self.references_provider,
            Feature::Rename => &self.rename_provider,
            Feature::SignatureHelp => &self.signature_help_provider,
            Feature::DocumentSymbols => &self.document_symbol_provider,
            Feature::WorkspaceSymbols => &self.workspace_symbol_provider,
            Feature::Implementation => &self.implementation_provider,
            Feature::DocumentLink => &self.document_link_provider,
        };
        slot.as_ref()
    }

    /// Whether the server answers `feature`.
    ///
    /// `false` and `null` providers count as absent. Servers that keep
    /// documents in sync push diagnostics, so `textDocumentSync` also counts
    /// for diagnostics.
    pub fn supports(&self, feature: Feature) -> bool {
        let advertised = |v: Option<&Value>| matches!(v, Some(v) if !v.is_null() && *v != Value::Bool(false));
        match feature {
            Feature::Diagnostics => {
                advertised(self.diagnostic_provider.as_ref())
                    || advertised(self.text_document_sync.as_ref())
            }
            other => advertised(self.provider(other)),
        }
    }

    pub fn supported_features(&self) -> BTreeSet<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| self.supports(*f))
            .collect()
    }

    /// True when the server advertised nothing usable
    pub fn is_empty(&self) -> bool {
        self.supported_features().is_empty()
    }
}
