//! Error types for confluence-export.
//!
//! Library crates use [`ExportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all export operations.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The remote service answered with a non-success status.
    #[error("{message}")]
    Api {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    /// Connection, timeout or body-decoding failure talking to the service.
    #[error("network error: {0}")]
    Network(String),

    /// Listing the children or descendants of a node failed.
    #[error("failed to discover descendants of {id}: {source}")]
    Discovery {
        id: String,
        #[source]
        source: Box<ExportError>,
    },

    /// Retrieving a page's metadata or body failed.
    #[error("failed to fetch page {id}: {source}")]
    Fetch {
        id: String,
        #[source]
        source: Box<ExportError>,
    },

    /// Unexpected failure while producing an output format.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The remote hierarchy references a node twice (cycle or self-parent).
    #[error("hierarchy integrity error: {0}")]
    Integrity(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input, unsupported format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Malformed response payload.
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an API error carrying an HTTP status.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status: Some(status),
            message: message.into(),
            body: None,
        }
    }

    /// Scope an error to the subtree rooted at `id`.
    pub fn discovery(id: impl Into<String>, source: ExportError) -> Self {
        Self::Discovery {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Scope an error to a single page.
    pub fn fetch(id: impl Into<String>, source: ExportError) -> Self {
        Self::Fetch {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// HTTP-like status code, looking through scoping wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::Discovery { source, .. } | Self::Fetch { source, .. } => source.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ExportError::config("missing base URL");
        assert_eq!(err.to_string(), "config error: missing base URL");

        let err = ExportError::validation("unknown format 'docx'");
        assert!(err.to_string().contains("docx"));
    }

    #[test]
    fn status_survives_scoping() {
        let inner = ExportError::api(404, "API request failed with status 404");
        let err = ExportError::fetch("123", inner);
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().starts_with("failed to fetch page 123"));

        let err = ExportError::discovery("9", ExportError::Network("timed out".into()));
        assert_eq!(err.status(), None);
    }
}
