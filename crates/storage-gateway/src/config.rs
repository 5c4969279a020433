use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::azure::QueueMessageEncoding;

/// Prefix for layered environment overrides, e.g. `STORAGE_GATEWAY__SERVER__PORT`.
pub const ENV_PREFIX: &str = "STORAGE_GATEWAY";

/// Conventional variables holding the storage connection string, in lookup order.
pub const CONNECTION_STRING_VARS: [&str; 2] =
    ["AzureStorage__ConnectionString", "AZURE_STORAGE_CONNECTION_STRING"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("the azure backend needs a connection string (set --connection-string or {})", CONNECTION_STRING_VARS.join(" / "))]
    MissingConnectionString,

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 7071,
        }
    }
}

/// Which storage implementation serves the requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Azure Storage via connection string
    #[default]
    Azure,
    /// In-process storage, lost on exit
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendMode,
    /// Azure Storage connection string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Wire encoding for queue message text
    pub queue_message_encoding: QueueMessageEncoding,
}

impl StorageConfig {
    /// Connection string from config, else from the conventional variables.
    pub fn resolve_connection_string(&self) -> Result<String, ConfigError> {
        self.connection_string
            .clone()
            .filter(|value| !value.is_empty())
            .or_else(connection_string_from_env)
            .ok_or(ConfigError::MissingConnectionString)
    }
}

fn connection_string_from_env() -> Option<String> {
    CONNECTION_STRING_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|value| !value.is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size for uploads (in bytes)
    pub max_upload_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 100 * 1024 * 1024, // 100 MB
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for this crate when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl GatewayConfig {
    /// Load config from an optional TOML file, then `STORAGE_GATEWAY__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let built = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(built.try_deserialize()?)
    }

    /// Load config from a TOML file only
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let built = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()?;
        Ok(built.try_deserialize()?)
    }

    /// Render as TOML with the connection string masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        if redacted.storage.connection_string.is_some() {
            redacted.storage.connection_string = Some("<redacted>".to_string());
        }
        Ok(toml::to_string_pretty(&redacted)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 7071);
        assert_eq!(config.storage.backend, BackendMode::Azure);
        assert_eq!(config.storage.queue_message_encoding, QueueMessageEncoding::None);
        assert_eq!(config.limits.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[storage]
backend = "memory"
queue_message_encoding = "base64"

[limits]
max_upload_size = 1024
"#
        )
        .unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.storage.backend, BackendMode::Memory);
        assert_eq!(
            config.storage.queue_message_encoding,
            QueueMessageEncoding::Base64
        );
        assert_eq!(config.limits.max_upload_size, 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GatewayConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_configured_connection_string_wins() {
        let storage = StorageConfig {
            connection_string: Some("UseDevelopmentStorage=true".to_string()),
            ..StorageConfig::default()
        };
        assert_eq!(
            storage.resolve_connection_string().unwrap(),
            "UseDevelopmentStorage=true"
        );
    }

    #[test]
    fn test_redacted_toml_hides_connection_string() {
        let mut config = GatewayConfig::default();
        config.storage.connection_string =
            Some("AccountName=acct;AccountKey=c2VjcmV0LWtleQ==".to_string());

        let rendered = config.to_redacted_toml().unwrap();
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("AccountKey"));
        assert!(rendered.contains("port = 7071"));
    }
}
