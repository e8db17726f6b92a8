//! CLI configuration management
//!
//! `~/.conduit/config.toml` holds the client settings plus an optional
//! default sending account.

use std::path::{Path, PathBuf};

use conduit_client::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::CliError;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Client settings
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Account used when a command omits `--from`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_from: Option<String>,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".conduit"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load `path`, or the default location; a missing file gives defaults
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let path = match path.map(Path::to_path_buf).or_else(Self::config_path) {
            Some(path) if path.exists() => path,
            _ => return Ok(Self::default()),
        };
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, CliError> {
        let config: Self = toml::from_str(content)?;
        config.client.validate()?;
        Ok(config)
    }

    /// Save to `path`, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, CliError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::config_path)
            .ok_or_else(|| CliError::Config("cannot determine config path".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
