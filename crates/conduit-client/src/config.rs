//! Client configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Settings supplied once when a [`Client`](crate::Client) is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Node endpoint URL
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Gas limit used when a call does not set one
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Interval between receipt / log polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long to wait for a receipt, in milliseconds
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    /// Per-request HTTP timeout, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Extra attempts for idempotent reads that fail at the transport level
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_gas_limit() -> u64 {
    1_000_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_receipt_timeout_ms() -> u64 {
    60_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_read_retries() -> u32 {
    2
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            gas_limit: default_gas_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            read_retries: default_read_retries(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `rpc_url`
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Parse from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Reject settings that would make polling spin or never start
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(ClientError::Config("rpc_url must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ClientError::Config("poll_interval_ms must be positive".into()));
        }
        if self.gas_limit == 0 {
            return Err(ClientError::Config("gas_limit must be positive".into()));
        }
        Ok(())
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Receipt timeout as a `Duration`
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.rpc_url, "http://localhost:8545");
        assert_eq!(config.gas_limit, 1_000_000);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.receipt_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_config_partial_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            rpc_url = "http://10.0.0.5:8545"
            poll_interval_ms = 250
        "#,
        )
        .unwrap();
        assert_eq!(config.rpc_url, "http://10.0.0.5:8545");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.gas_limit, 1_000_000);
        assert_eq!(config.read_retries, 2);
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let result = ClientConfig::from_toml_str("poll_interval_ms = 0");
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_config_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"gas_limit = 4700000\nreceipt_timeout_ms = 1000\n")
            .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.gas_limit, 4_700_000);
        assert_eq!(config.receipt_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = ClientConfig::new("http://node:8545");
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("rpc_url"));
        assert_eq!(ClientConfig::from_toml_str(&text).unwrap(), config);
    }
}
