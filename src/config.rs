//! Server configuration
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. `FLIGHTDECK_*` environment variables (a `.env` file is honoured)
//! 4. command-line flags, applied by the binary

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::TelemetryError;
use crate::sources::{DEFAULT_UDP_HOST, DEFAULT_UDP_PORT};
use crate::ulog::DEFAULT_MAX_SAMPLES_PER_MESSAGE;

/// Default HTTP listen address
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

/// Default per-subscriber buffer, in samples
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default upload limit (256 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 256 * 1024 * 1024;

const ENV_PREFIX: &str = "FLIGHTDECK_";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// UDP bind host for MAVLink telemetry
    pub udp_host: String,
    /// UDP bind port for MAVLink telemetry
    pub udp_port: u16,
    /// Samples buffered per subscriber before it starts skipping
    pub channel_capacity: usize,
    /// Maximum upload body size in bytes
    pub max_upload_size: usize,
    /// Rows kept per message in a ULog summary
    pub max_samples_per_message: usize,
    /// Bind the UDP socket at boot instead of on first stream request
    pub auto_start: bool,
    /// CORS allowed origins; empty disables CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            udp_host: DEFAULT_UDP_HOST.to_string(),
            udp_port: DEFAULT_UDP_PORT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_samples_per_message: DEFAULT_MAX_SAMPLES_PER_MESSAGE,
            auto_start: true,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Defaults, optionally overlaid by a YAML file, then by the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };

        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }
        config.apply_vars(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&text).map_err(|e| match e {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml { path: path.to_path_buf(), source },
            other => other,
        })
    }

    /// Parse YAML; missing keys keep their defaults
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str(text)
            .map_err(|source| ConfigError::Yaml { path: PathBuf::from("<inline>"), source })
    }

    /// Overlay `FLIGHTDECK_*` variables from `vars`; others are ignored
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();
            match name {
                "HTTP_ADDR" => self.http_addr = parse_value(key.as_ref(), value)?,
                "UDP_HOST" => self.udp_host = value.to_string(),
                "UDP_PORT" => self.udp_port = parse_value(key.as_ref(), value)?,
                "CHANNEL_CAPACITY" => self.channel_capacity = parse_value(key.as_ref(), value)?,
                "MAX_UPLOAD_SIZE" => self.max_upload_size = parse_value(key.as_ref(), value)?,
                "MAX_SAMPLES" => self.max_samples_per_message = parse_value(key.as_ref(), value)?,
                "AUTO_START" => self.auto_start = parse_bool(key.as_ref(), value)?,
                "CORS_ORIGINS" => {
                    self.cors_origins = value
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                _ => debug!("Ignoring unknown variable {}", key.as_ref()),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "channel_capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_samples_per_message == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_samples_per_message".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.udp_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "udp_host".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{value}': {e}"),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{value}' is not a boolean"),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<ConfigError> for TelemetryError {
    fn from(err: ConfigError) -> Self {
        TelemetryError::config_error(err.to_string())
    }
}
