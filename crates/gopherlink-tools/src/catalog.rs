//! Known Go tools and where they come from

use serde::Serialize;

/// A Go tool gopherlink knows how to find and install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    /// Logical name, also the binary name
    pub name: &'static str,
    /// Go import path used to install it; None for tools shipped with Go
    pub import_path: Option<&'static str>,
    /// Offered proactively at activation when missing
    pub is_important: bool,
    /// The tool this one replaces inside module-aware workspaces
    pub module_variant_of: Option<&'static str>,
    /// Checked against the module registry for newer releases
    pub auto_update: bool,
}

impl ToolDescriptor {
    const fn new(name: &'static str, import_path: &'static str) -> Self {
        Self {
            name,
            import_path: Some(import_path),
            is_important: false,
            module_variant_of: None,
            auto_update: false,
        }
    }

    const fn important(mut self) -> Self {
        self.is_important = true;
        self
    }

    const fn variant_of(mut self, tool: &'static str) -> Self {
        self.module_variant_of = Some(tool);
        self
    }

    const fn auto_update(mut self) -> Self {
        self.auto_update = true;
        self
    }

    /// Whether `go install` can produce this tool
    pub fn is_installable(&self) -> bool {
        self.import_path.is_some()
    }

    /// Binary file name on this platform
    pub fn binary_name(&self) -> String {
        format!("{}{}", self.name, std::env::consts::EXE_SUFFIX)
    }
}

/// Name of the language server binary
pub const LANGUAGE_SERVER: &str = "gopls";

const TOOLS: &[ToolDescriptor] = &[
    ToolDescriptor::new("gopls", "golang.org/x/tools/gopls").auto_update(),
    ToolDescriptor::new("gocode", "github.com/mdempsky/gocode").important(),
    ToolDescriptor::new("gocode-gomod", "github.com/stamblerre/gocode")
        .important()
        .variant_of("gocode"),
    ToolDescriptor::new("gogetdoc", "github.com/zmb3/gogetdoc").important(),
    ToolDescriptor::new("godef", "github.com/rogpeppe/godef").important(),
    ToolDescriptor::new("guru", "golang.org/x/tools/cmd/guru").important(),
    ToolDescriptor::new("gorename", "golang.org/x/tools/cmd/gorename").important(),
    ToolDescriptor::new("go-outline", "github.com/ramya-rao-a/go-outline").important(),
    ToolDescriptor::new("go-symbols", "github.com/acroca/go-symbols").important(),
    ToolDescriptor::new("golint", "golang.org/x/lint/golint").important(),
    ToolDescriptor::new("goreturns", "github.com/sqs/goreturns").important(),
    ToolDescriptor::new("goimports", "golang.org/x/tools/cmd/goimports"),
    ToolDescriptor::new("gotype-live", "github.com/tylerb/gotype-live"),
    ToolDescriptor::new("staticcheck", "honnef.co/go/tools/cmd/staticcheck"),
    ToolDescriptor::new(
        "golangci-lint",
        "github.com/golangci/golangci-lint/cmd/golangci-lint",
    ),
    ToolDescriptor::new("revive", "github.com/mgechev/revive"),
    ToolDescriptor {
        name: "gofmt",
        import_path: None,
        is_important: false,
        module_variant_of: None,
        auto_update: false,
    },
    ToolDescriptor {
        name: "go",
        import_path: None,
        is_important: false,
        module_variant_of: None,
        auto_update: false,
    },
];

/// Every known tool
pub fn all_tools() -> &'static [ToolDescriptor] {
    TOOLS
}

/// Look up a tool by logical name
pub fn get_tool(name: &str) -> Option<&'static ToolDescriptor> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Tools offered at activation when missing.
///
/// In module-aware workspaces a module variant replaces the tool it is a
/// variant of; outside them the variant is left out.
pub fn important_tools(module_mode: bool) -> Vec<&'static ToolDescriptor> {
    TOOLS
        .iter()
        .filter(|t| t.is_important)
        .filter(|t| match t.module_variant_of {
            Some(_) => module_mode,
            None => !(module_mode && has_module_variant(t.name)),
        })
        .collect()
}

/// The tool to run for `name`, switching to its module variant when needed
pub fn tool_for_workspace(name: &str, module_mode: bool) -> &str {
    if module_mode {
        if let Some(variant) = TOOLS
            .iter()
            .find(|t| t.module_variant_of == Some(name))
        {
            return variant.name;
        }
    }
    name
}

fn has_module_variant(name: &str) -> bool {
    TOOLS.iter().any(|t| t.module_variant_of == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_language_server_auto_updates() {
        let updatable: Vec<_> = all_tools().iter().filter(|t| t.auto_update).collect();
        assert_eq!(updatable.len(), 1);
        assert_eq!(updatable[0].name, LANGUAGE_SERVER);
    }

    #[test]
    fn test_module_variant_swaps_in_module_mode() {
        assert_eq!(tool_for_workspace("gocode", true), "gocode-gomod");
        assert_eq!(tool_for_workspace("gocode", false), "gocode");
        assert_eq!(tool_for_workspace("guru", true), "guru");

        let gopath_mode: Vec<_> = important_tools(false).iter().map(|t| t.name).collect();
        assert!(gopath_mode.contains(&"gocode"));
        assert!(!gopath_mode.contains(&"gocode-gomod"));

        let module_mode: Vec<_> = important_tools(true).iter().map(|t| t.name).collect();
        assert!(module_mode.contains(&"gocode-gomod"));
        assert!(!module_mode.contains(&"gocode"));
    }

    #[test]
    fn test_builtin_tools_are_not_installable() {
        assert!(!get_tool("gofmt").unwrap().is_installable());
        assert!(get_tool("gorename").unwrap().is_installable());
        assert!(get_tool("nope").is_none());
    }
}
