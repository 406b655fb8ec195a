//! Inline status text shown next to a page's table.

use std::fmt;

use portal_client::ClientError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    #[default]
    Idle,
    Busy,
    Info,
    Ok,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusLine {
    fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    pub fn busy(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Busy, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Info, text)
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Ok, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Error, text)
    }

    /// `"<what>: HTTP 500"`, or the transport message when no status came back.
    pub fn from_client_error(what: &str, err: &ClientError) -> Self {
        let detail = match err.status() {
            Some(status) => format!("HTTP {}", status),
            None => err.to_string(),
        };
        Self::error(format!("{}: {}", what, detail))
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_client_error_prefers_status() {
        let err = ClientError::Http {
            status: 502,
            body: "<html>bad gateway</html>".into(),
        };
        let status = StatusLine::from_client_error("search failed", &err);
        assert!(status.is_error());
        assert_eq!(status.to_string(), "search failed: HTTP 502");
    }

    #[test]
    fn test_without_status_uses_message() {
        let err = ClientError::Url("relative URL without a base".into());
        let status = StatusLine::from_client_error("load failed", &err);
        assert_eq!(
            status.text,
            "load failed: invalid url: relative URL without a base"
        );
    }
}
