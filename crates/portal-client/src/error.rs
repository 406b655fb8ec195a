//! Collaborator error types.

use thiserror::Error;

/// Failure of one request/response unit. No variant is retried.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The collaborator answered with a non-2xx status.
    #[error("HTTP {status}: {}", truncate(.body, 200))]
    Http {
        status: u16,
        /// Raw response body (JSON or text)
        body: String,
    },

    /// The request never produced a response (connect, timeout, TLS, ...).
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx body could not be read as the expected JSON.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    /// Base URL cannot carry path segments or failed to parse.
    #[error("invalid url: {0}")]
    Url(String),
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Url(err.to_string())
    }
}

impl ClientError {
    /// HTTP status when the collaborator answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short code for status lines and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http { .. } => "HTTP",
            Self::Transport(_) => "NETWORK",
            Self::Decode(_) => "DECODE",
            Self::Url(_) => "URL",
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
