//! HTTP client configuration for registry fetches

use std::time::Duration;

use gopherlink_config::{ConfigError, ExtensionConfig};

use crate::error::{Result, ToolsError};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// HTTP/HTTPS proxy URL
    pub proxy: Option<String>,
    /// Custom user agent
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            proxy: None,
            user_agent: format!("gopherlink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the proxy from the extension settings
    pub fn from_extension(config: &ExtensionConfig) -> Self {
        Self {
            proxy: config.http_proxy.clone().filter(|p| !p.is_empty()),
            ..Self::default()
        }
    }

    /// Set proxy URL
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a reqwest client honoring the proxy setting
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent);

        if let Some(proxy_url) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                ToolsError::Config(ConfigError::Validation(format!(
                    "Invalid http_proxy '{}': {}",
                    proxy_url, e
                )))
            })?;
            builder = builder.proxy(proxy);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_proxy_taken_from_settings() {
        let config = ExtensionConfig {
            http_proxy: Some("http://proxy.local:3128".to_string()),
            ..Default::default()
        };
        let http = HttpConfig::from_extension(&config);
        assert_eq!(http.proxy.as_deref(), Some("http://proxy.local:3128"));
        assert!(http.build_client().is_ok());
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let http = HttpConfig::new().with_proxy("http://[::1");
        let err = http.build_client().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
