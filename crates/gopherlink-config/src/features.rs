//! Editor features and their per-configuration toggles

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// One discrete editor-facing capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Completion,
    Diagnostics,
    Formatting,
    Definition,
    TypeDefinition,
    Hover,
    References,
    Rename,
    SignatureHelp,
    DocumentSymbols,
    WorkspaceSymbols,
    Implementation,
    DocumentLink,
}

/// Shape of a feature's answer, which fixes its no-op convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Answers are sequences; the no-op answer is an empty sequence
    List,
    /// Answers are a single value; the no-op answer is null
    Single,
}

impl Feature {
    /// Every feature, in declaration order
    pub const ALL: [Feature; 13] = [
        Feature::Completion,
        Feature::Diagnostics,
        Feature::Formatting,
        Feature::Definition,
        Feature::TypeDefinition,
        Feature::Hover,
        Feature::References,
        Feature::Rename,
        Feature::SignatureHelp,
        Feature::DocumentSymbols,
        Feature::WorkspaceSymbols,
        Feature::Implementation,
        Feature::DocumentLink,
    ];

    /// Configuration key under `[features]`
    pub fn key(&self) -> &'static str {
        match self {
            Feature::Completion => "completion",
            Feature::Diagnostics => "diagnostics",
            Feature::Formatting => "formatting",
            Feature::Definition => "definition",
            Feature::TypeDefinition => "type_definition",
            Feature::Hover => "hover",
            Feature::References => "references",
            Feature::Rename => "rename",
            Feature::SignatureHelp => "signature_help",
            Feature::DocumentSymbols => "document_symbols",
            Feature::WorkspaceSymbols => "workspace_symbols",
            Feature::Implementation => "implementation",
            Feature::DocumentLink => "document_link",
        }
    }

    /// LSP method that carries requests for this feature
    pub fn method(&self) -> &'static str {
        match self {
            Feature::Completion => "textDocument/completion",
            Feature::Diagnostics => "textDocument/diagnostic",
            Feature::Formatting => "textDocument/formatting",
            Feature::Definition => "textDocument/definition",
            Feature::TypeDefinition => "textDocument/typeDefinition",
            Feature::Hover => "textDocument/hover",
            Feature::References => "textDocument/references",
            Feature::Rename => "textDocument/rename",
            Feature::SignatureHelp => "textDocument/signatureHelp",
            Feature::DocumentSymbols => "textDocument/documentSymbol",
            Feature::WorkspaceSymbols => "workspace/symbol",
            Feature::Implementation => "textDocument/implementation",
            Feature::DocumentLink => "textDocument/documentLink",
        }
    }

    /// Map an LSP method back to the feature it belongs to
    pub fn from_method(method: &str) -> Option<Feature> {
        if method == "textDocument/publishDiagnostics" {
            return Some(Feature::Diagnostics);
        }
        Feature::ALL.iter().copied().find(|f| f.method() == method)
    }

    /// Key in the server's `initialize` result advertising this feature
    pub fn capability_key(&self) -> &'static str {
        match self {
            Feature::Completion => "completionProvider",
            Feature::Diagnostics => "diagnosticProvider",
            Feature::Formatting => "documentFormattingProvider",
            Feature::Definition => "definitionProvider",
            Feature::TypeDefinition => "typeDefinitionProvider",
            Feature::Hover => "hoverProvider",
            Feature::References => "referencesProvider",
            Feature::Rename => "renameProvider",
            Feature::SignatureHelp => "signatureHelpProvider",
            Feature::DocumentSymbols => "documentSymbolProvider",
            Feature::WorkspaceSymbols => "workspaceSymbolProvider",
            Feature::Implementation => "implementationProvider",
            Feature::DocumentLink => "documentLinkProvider",
        }
    }

    pub fn shape(&self) -> ResponseShape {
        match self {
            Feature::Completion
            | Feature::Diagnostics
            | Feature::Formatting
            | Feature::References
            | Feature::DocumentSymbols
            | Feature::WorkspaceSymbols
            | Feature::Implementation
            | Feature::DocumentLink => ResponseShape::List,
            Feature::Definition
            | Feature::TypeDefinition
            | Feature::Hover
            | Feature::Rename
            | Feature::SignatureHelp => ResponseShape::Single,
        }
    }

    /// The answer given when nothing answers the feature
    pub fn empty_response(&self) -> Value {
        match self.shape() {
            ResponseShape::List => Value::Array(Vec::new()),
            ResponseShape::Single => Value::Null,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Feature {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.key() == normalized)
            .ok_or_else(|| ConfigError::Parse(format!("Unknown feature: {}", s)))
    }
}

/// Per-feature enable flags; one immutable snapshot per configuration load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggleSet {
    pub completion: bool,
    pub diagnostics: bool,
    pub formatting: bool,
    pub definition: bool,
    pub type_definition: bool,
    pub hover: bool,
    pub references: bool,
    pub rename: bool,
    pub signature_help: bool,
    pub document_symbols: bool,
    pub workspace_symbols: bool,
    pub implementation: bool,
    pub document_link: bool,
}

impl FeatureToggleSet {
    /// Every feature switched on
    pub fn all_enabled() -> Self {
        Self::uniform(true)
    }

    /// Every feature switched off
    pub fn all_disabled() -> Self {
        Self::uniform(false)
    }

    fn uniform(value: bool) -> Self {
        Self {
            completion: value,
            diagnostics: value,
            formatting: value,
            definition: value,
            type_definition: value,
            hover: value,
            references: value,
            rename: value,
            signature_help: value,
            document_symbols: value,
            workspace_symbols: value,
            implementation: value,
            document_link: value,
        }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Completion => self.completion,
            Feature::Diagnostics => self.diagnostics,
            Feature::Formatting => self.formatting,
            Feature::Definition => self.definition,
            Feature::TypeDefinition => self.type_definition,
            Feature::Hover => self.hover,
            Feature::References => self.references,
            Feature::Rename => self.rename,
            Feature::SignatureHelp => self.signature_help,
            Feature::DocumentSymbols => self.document_symbols,
            Feature::WorkspaceSymbols => self.workspace_symbols,
            Feature::Implementation => self.implementation,
            Feature::DocumentLink => self.document_link,
        }
    }

    /// Copy of this set with one flag changed
    pub fn with(mut self, feature: Feature, enabled: bool) -> Self {
        let slot = match feature {
            Feature::Completion => &mut self.completion,
            Feature::Diagnostics => &mut self.diagnostics,
            Feature::Formatting => &mut self.formatting,
            Feature::Definition => &mut self.definition,
            Feature::TypeDefinition => &mut self.type_definition,
            Feature::Hover => &mut self.hover,
            Feature::References => &mut self.references,
            Feature::Rename => &mut self.rename,
            Feature::SignatureHelp => &mut self.signature_help,
            Feature::DocumentSymbols => &mut self.document_symbols,
            Feature::WorkspaceSymbols => &mut self.workspace_symbols,
            Feature::Implementation => &mut self.implementation,
            Feature::DocumentLink => &mut self.document_link,
        };
        *slot = enabled;
        self
    }

    pub fn enabled_features(&self) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }
}

impl Default for FeatureToggleSet {
    fn default() -> Self {
        Self::all_enabled()
    }
}
