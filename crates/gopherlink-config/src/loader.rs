//! Layered configuration loading

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::error::Result;
use crate::types::ExtensionConfig;

/// Environment prefix for overrides, e.g. `GOPHERLINK__USE_LANGUAGE_SERVER=false`
pub const ENV_PREFIX: &str = "GOPHERLINK";

/// Loads [`ExtensionConfig`] from a TOML file layered with environment overrides
pub struct ConfigLoader {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment prefix
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gopherlink")
            .join("config.toml")
    }

    /// Load and validate the configuration; a missing file yields defaults
    pub fn load(&self) -> Result<ExtensionConfig> {
        debug!(path = ?self.config_path, "Loading configuration");

        let settings = Config::builder()
            .add_source(File::from(self.config_path.clone()).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ExtensionConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn load_from_str(content: &str) -> Result<ExtensionConfig> {
        let settings = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        let config: ExtensionConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as TOML
    pub fn save(&self, config: &ExtensionConfig) -> Result<()> {
        let content = toml::to_string_pretty(config)
            .map_err(|e| crate::error::ConfigError::Parse(e.to_string()))?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;

    #[test]
    fn test_load_from_str_overrides_defaults() {
        let config = ConfigLoader::load_from_str(
            r#"
            use_language_server = false
            lint_tool = "staticcheck"

            [features]
            rename = false

            [alternate_tools]
            gopls = "/opt/gopls"
            "#,
        )
        .unwrap();

        assert!(!config.use_language_server);
        assert_eq!(config.lint_tool, "staticcheck");
        assert!(!config.features.is_enabled(Feature::Rename));
        assert!(config.features.is_enabled(Feature::Hover));
        assert_eq!(config.alternate_tools.get("gopls").unwrap(), "/opt/gopls");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = ConfigLoader::load_from_str("startup_timeout_ms = 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_path(dir.path().join("absent.toml"))
            .env_prefix("GOPHERLINK_TEST_MISSING_FILE");
        let config = loader.load().unwrap();
        assert_eq!(config, ExtensionConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let loader = ConfigLoader::with_path(&path).env_prefix("GOPHERLINK_TEST_SAVE");

        let config = ExtensionConfig {
            language_server_flags: vec!["-rpc.trace".to_string()],
            ..Default::default()
        };
        loader.save(&config).unwrap();

        let loaded = loader.load().unwrap();
        assert_eq!(loaded.language_server_flags, vec!["-rpc.trace".to_string()]);
    }
}
