//! Portal error types.

use std::path::PathBuf;

use portal_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// A collaborator request failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A config value is out of range.
    #[error("invalid config value {key}: {message}")]
    ConfigValue { key: String, message: String },

    /// An event referenced a row the page does not hold.
    #[error("unknown row: {0}")]
    UnknownRow(String),
}

impl PortalError {
    pub fn config_value(key: &str, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Short code for logs and status lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Client(e) => e.code(),
            Self::ConfigRead { .. } | Self::ConfigParse(_) | Self::ConfigValue { .. } => "CONFIG",
            Self::UnknownRow(_) => "UNKNOWN_ROW",
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
