//! Relay configuration
//!
//! The config file carries the listen address and the upstream pipe path:
//!
//! ```json
//! { "ip": "0.0.0.0", "port": "8000", "fifo": "/tmp/audio.fifo" }
//! ```
//!
//! Files ending in `.toml` are parsed as TOML with the same keys; anything
//! else is parsed as JSON.

use serde::{Deserialize, Deserializer, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_HTTP_PORT, DEFAULT_QUEUE_CAPACITY};
use crate::error::ConfigError;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Listen IP; empty means all interfaces
    pub ip: String,

    /// Listen port, written either as a number or a string
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,

    /// Path of the upstream named pipe
    pub fifo: PathBuf,

    /// Maximum bytes per upstream read
    pub chunk_size: usize,

    /// Per-listener queue depth, in chunks
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ip: String::new(),
            port: DEFAULT_HTTP_PORT,
            fifo: PathBuf::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config = if is_toml {
            Self::from_toml_str(&text)?
        } else {
            Self::from_json_str(&text)?
        };

        tracing::debug!(path = %path.display(), ?config, "Loaded config");
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML config
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the fields the relay cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fifo.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "fifo",
                reason: "source path is required".into(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunk_size",
                reason: "must be greater than zero".into(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_capacity",
                reason: "must be greater than zero".into(),
            });
        }
        self.listen_addr()?;
        Ok(())
    }

    /// Socket address to bind the HTTP listener on
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self.ip.trim();
        if ip.is_empty() {
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port));
        }
        let ip: IpAddr = ip
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.ip.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Config file in the platform config directory, if one exists
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = directories::ProjectDirs::from("", "", "pipecast")
            .ok_or_else(|| ConfigError::NotFound("<no home directory>".into()))?;
        let dir = dirs.config_dir();

        ["config.toml", "config.json"]
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::NotFound(dir.display().to_string()))
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {text:?}"))),
    }
}
