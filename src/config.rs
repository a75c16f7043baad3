//! Application configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty or
//! partial file is valid.
//!
//! ```toml
//! [server]
//! ws_host = "0.0.0.0"
//! ws_port = 9000
//!
//! [sync]
//! run_every_secs = 60
//! retry_after_secs = 120
//! page_size = 50
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::SyncConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub sync: SyncSettings,
    pub schemas: SchemaConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ws_host: String,
    pub ws_port: u16,
    /// Seconds to wait for tasks to stop after shutdown is triggered.
    pub shutdown_timeout: u64,
    /// Heartbeat interval handed to stations in BootNotification, seconds.
    pub heartbeat_interval: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_host: "0.0.0.0".to_string(),
            ws_port: 9000,
            shutdown_timeout: 30,
            heartbeat_interval: 300,
        }
    }
}

impl ServerConfig {
    pub fn ws_address(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub run_every_secs: u64,
    pub retry_after_secs: u64,
    pub page_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            run_every_secs: defaults.run_every.as_secs(),
            retry_after_secs: defaults.retry_after.as_secs(),
            page_size: defaults.page_size,
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            run_every: Duration::from_secs(settings.run_every_secs),
            retry_after: Duration::from_secs(settings.retry_after_secs),
            page_size: settings.page_size,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Directory holding `ocpp16/`, `ocpp201/` and `has2be/`. The schemas
    /// bundled with the crate are used when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Address of the Prometheus scrape endpoint.
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:9091".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.sync.run_every_secs == 0 {
            return Err(ConfigError::Invalid("sync.run_every_secs must be > 0".into()));
        }
        if self.sync.page_size == 0 {
            return Err(ConfigError::Invalid("sync.page_size must be > 0".into()));
        }
        if self.metrics.enabled && self.metrics.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "metrics.listen is not a socket address: {}",
                self.metrics.listen
            )));
        }
        match self.logging.format.to_lowercase().as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be text or json, got {other}"
            ))),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::from(&self.sync)
    }
}

/// `<config_dir>/maeve-csms/config.toml`, or `./config.toml` when the
/// platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("maeve-csms").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
