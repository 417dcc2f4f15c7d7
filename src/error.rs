//! Error types for the relay

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the relay
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid listen address {0}")]
    InvalidAddress(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("No config file given and none found in {0}")]
    NotFound(String),
}

/// Upstream source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read source: {0}")]
    Read(#[source] std::io::Error),
}

impl SourceError {
    /// Whether the error happened before any byte was read
    pub fn is_startup(&self) -> bool {
        matches!(self, SourceError::Open { .. })
    }
}

/// HTTP listener errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Socket bind failed on {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server terminated: {0}")]
    Serve(#[source] std::io::Error),
}

/// Result type alias for the relay
pub type Result<T> = std::result::Result<T, Error>;
