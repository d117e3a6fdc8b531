//! Remote module registry lookups

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{Result, ToolsError};
use crate::http::HttpConfig;

/// Default Go module proxy
pub const DEFAULT_MODULE_PROXY: &str = "https://proxy.golang.org/";

/// Source of published versions for a module
#[async_trait]
pub trait VersionRegistry: Send + Sync {
    /// Published versions of `module`, in registry order
    async fn list_versions(&self, module: &str) -> Result<Vec<String>>;
}

/// Registry backed by the Go module proxy protocol (`<module>/@v/list`)
#[derive(Debug, Clone)]
pub struct ModuleProxyRegistry {
    client: Client,
    base_url: Url,
}

impl ModuleProxyRegistry {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        Self::with_base_url(http, DEFAULT_MODULE_PROXY)
    }

    /// Use another proxy root, e.g. a corporate mirror
    pub fn with_base_url(http: &HttpConfig, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ToolsError::registry(format!("Invalid registry URL {}: {}", base_url, e)))?;
        Ok(Self {
            client: http.build_client()?,
            base_url,
        })
    }

    fn list_url(&self, module: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}/@v/list", escape_module_path(module)))
            .map_err(|e| ToolsError::registry(format!("Invalid module path {}: {}", module, e)))
    }
}

#[async_trait]
impl VersionRegistry for ModuleProxyRegistry {
    async fn list_versions(&self, module: &str) -> Result<Vec<String>> {
        let url = self.list_url(module)?;
        debug!(module = %module, url = %url, "Fetching module versions");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ToolsError::registry(format!(
                "Registry returned status {} for {}",
                response.status(),
                module
            )));
        }

        let body = response.text().await?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Case-encode a module path: each upper-case letter becomes `!` plus its lower case
pub fn escape_module_path(module: &str) -> String {
    let mut escaped = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}
