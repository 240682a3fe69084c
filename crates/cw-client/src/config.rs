//! Configuration management for the client

use cw_types::{GasPrice, DEFAULT_MAX_TX_BYTES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error:: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parsing error:: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("toml serialization error:: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("unknown configuration key:: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}:: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key,
            reason: reason.to_string(),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Node RPC endpoint
    pub endpoint: String,
    /// Expected chain ID; learned from the node when unset
    pub chain_id: Option<String>,
    pub gas_price: GasPrice,
    /// Multiplier applied to simulated gas
    pub gas_adjustment: f64,
    /// Gas limit used when simulation is unavailable
    pub default_gas_limit: u64,
    pub min_gas_limit: u64,
    pub max_gas_limit: u64,
    pub poll_interval_ms: u64,
    pub confirm_timeout_ms: u64,
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
    /// Extra attempts for idempotent queries after the first
    pub max_query_retries: u32,
    pub retry_base_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
    pub max_tx_bytes: usize,
    /// Output format for the CLI (text, json)
    pub output: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:26657".to_string(),
            chain_id: None,
            gas_price: GasPrice::new("uatom", cw_types::Dec::zero()),
            gas_adjustment: 1.4,
            default_gas_limit: 200_000,
            min_gas_limit: 50_000,
            max_gas_limit: 10_000_000,
            poll_interval_ms: 1_000,
            confirm_timeout_ms: 30_000,
            request_timeout_ms: 10_000,
            max_query_retries: 3,
            retry_base_backoff_ms: 100,
            retry_max_backoff_ms: 5_000,
            max_tx_bytes: DEFAULT_MAX_TX_BYTES,
            output: "text".to_string(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at `endpoint` with everything else defaulted
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// `~/.cwcli`
    pub fn default_config_dir() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(".cwcli")
        } else {
            PathBuf::from(".cwcli")
        }
    }

    /// `config.toml` inside `dir`
    pub fn config_file(dir: &Path) -> PathBuf {
        dir.join("config.toml")
    }

    /// Load the config file in `dir`, or defaults if there is none
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = Self::config_file(dir);

        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write a default config file into `dir`, keeping an existing one unless
    /// `overwrite` is set
    pub fn init(dir: &Path, overwrite: bool) -> Result<Self, ConfigError> {
        let config_file = Self::config_file(dir);

        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        if config_file.exists() && !overwrite {
            return Self::load_from_file(config_file);
        }

        let config = Self::default();
        config.save_to_file(config_file)?;
        Ok(config)
    }

    /// Set a configuration value by key, as the CLI does. The config is
    /// left untouched if the result would not validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut next = self.clone();
        match key {
            "endpoint" => next.endpoint = value.to_string(),
            "chain_id" => {
                next.chain_id = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "gas_price" => {
                next.gas_price =
                    GasPrice::from_str(value).map_err(|e| ConfigError::invalid("gas_price", e))?
            }
            "gas_adjustment" => next.gas_adjustment = parse("gas_adjustment", value)?,
            "default_gas_limit" => next.default_gas_limit = parse("default_gas_limit", value)?,
            "min_gas_limit" => next.min_gas_limit = parse("min_gas_limit", value)?,
            "max_gas_limit" => next.max_gas_limit = parse("max_gas_limit", value)?,
            "poll_interval_ms" => next.poll_interval_ms = parse("poll_interval_ms", value)?,
            "confirm_timeout_ms" => next.confirm_timeout_ms = parse("confirm_timeout_ms", value)?,
            "request_timeout_ms" => next.request_timeout_ms = parse("request_timeout_ms", value)?,
            "max_query_retries" => next.max_query_retries = parse("max_query_retries", value)?,
            "retry_base_backoff_ms" => {
                next.retry_base_backoff_ms = parse("retry_base_backoff_ms", value)?
            }
            "retry_max_backoff_ms" => {
                next.retry_max_backoff_ms = parse("retry_max_backoff_ms", value)?
            }
            "max_tx_bytes" => next.max_tx_bytes = parse("max_tx_bytes", value)?,
            "output" => next.output = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| ConfigError::invalid("endpoint", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "endpoint",
                format!("unsupported scheme {}", url.scheme()),
            ));
        }
        if !self.gas_adjustment.is_finite() || self.gas_adjustment < 1.0 {
            return Err(ConfigError::invalid(
                "gas_adjustment",
                "must be a finite number >= 1.0",
            ));
        }
        if self.min_gas_limit > self.max_gas_limit {
            return Err(ConfigError::invalid(
                "min_gas_limit",
                "must not exceed max_gas_limit",
            ));
        }
        if self.default_gas_limit < self.min_gas_limit
            || self.default_gas_limit > self.max_gas_limit
        {
            return Err(ConfigError::invalid(
                "default_gas_limit",
                "must lie between min_gas_limit and max_gas_limit",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("poll_interval_ms", "must be positive"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("request_timeout_ms", "must be positive"));
        }
        if self.retry_base_backoff_ms > self.retry_max_backoff_ms {
            return Err(ConfigError::invalid(
                "retry_base_backoff_ms",
                "must not exceed retry_max_backoff_ms",
            ));
        }
        if self.max_tx_bytes == 0 {
            return Err(ConfigError::invalid("max_tx_bytes", "must be positive"));
        }
        if !matches!(self.output.as_str(), "text" | "json") {
            return Err(ConfigError::invalid("output", "expected text or json"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: ToString,
{
    value.parse().map_err(|e: T::Err| ConfigError::invalid(key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "http://127.0.0.1:26657");
        assert_eq!(config.chain_id, None);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.max_query_retries, 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut original = ClientConfig::new("http://localhost:8080");
        original.chain_id = Some("dev-1".to_string());
        original.gas_price = "0.025uatom".parse().unwrap();
        original.confirm_timeout_ms = 5_000;

        original.save_to_file(&config_path).unwrap();
        let loaded = ClientConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, original);

        let raw = std::fs::read_to_string(&config_path).unwrap();
        assert!(raw.contains("gas_price = \"0.025uatom\""));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "endpoint = \"http://node:26657\"\n").unwrap();

        let loaded = ClientConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.endpoint, "http://node:26657");
        assert_eq!(loaded.default_gas_limit, 200_000);
    }

    #[test]
    fn test_set_config_values() {
        let mut config = ClientConfig::default();

        config.set("endpoint", "http://localhost:8080").unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080");

        config.set("chain_id", "test-chain").unwrap();
        assert_eq!(config.chain_id.as_deref(), Some("test-chain"));
        config.set("chain_id", "").unwrap();
        assert_eq!(config.chain_id, None);

        config.set("confirm_timeout_ms", "60000").unwrap();
        assert_eq!(config.confirm_timeout_ms, 60_000);

        config.set("gas_price", "0.5uosmo").unwrap();
        assert_eq!(config.gas_price.denom, "uosmo");

        assert!(matches!(
            config.set("invalid_key", "value"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            config.set("poll_interval_ms", "soon"),
            Err(ConfigError::InvalidValue {
                key: "poll_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::default();
        assert!(config.set("endpoint", "ftp://node").is_err());
        assert!(config.set("gas_adjustment", "0.5").is_err());
        assert!(config.set("min_gas_limit", "20000000").is_err());
        assert!(config.set("poll_interval_ms", "0").is_err());
        // rejected edits leave the config as it was
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_or_default() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path();

        let missing = ClientConfig::load_or_default(dir).unwrap();
        assert_eq!(missing, ClientConfig::default());

        std::fs::write(
            ClientConfig::config_file(dir),
            "endpoint = \"http://node:26657\"\nchain_id = \"dev-1\"\n",
        )
        .unwrap();
        let loaded = ClientConfig::load_or_default(dir).unwrap();
        assert_eq!(loaded.chain_id.as_deref(), Some("dev-1"));

        std::fs::write(ClientConfig::config_file(dir), "gas_adjustment = 0.1\n").unwrap();
        assert!(ClientConfig::load_or_default(dir).is_err());
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("cwcli");

        let mut created = ClientConfig::init(&dir, false).unwrap();
        assert_eq!(created, ClientConfig::default());

        created.set("endpoint", "http://other:26657").unwrap();
        created.save_to_file(dir.join("config.toml")).unwrap();

        let kept = ClientConfig::init(&dir, false).unwrap();
        assert_eq!(kept.endpoint, "http://other:26657");

        let reset = ClientConfig::init(&dir, true).unwrap();
        assert_eq!(reset, ClientConfig::default());
    }
}
