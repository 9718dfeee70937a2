//! Error types for QueryHarvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all QueryHarvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error after retries were exhausted (or a non-retryable status).
    #[error("network error fetching {url}: {message}")]
    Network {
        url: String,
        message: String,
        /// HTTP status of the last response, if one was received.
        status: Option<u16>,
    },

    /// The catalog listing could not be interpreted. Fatal to a run.
    #[error("catalog parse error: {message}")]
    CatalogParse { message: String },

    /// A detail document lacked a mandatory field. Fatal to one entry only.
    #[error("extraction error for {id}: {message}")]
    Extraction { id: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a network error for `url`.
    pub fn network(url: impl Into<String>, msg: impl Into<String>, status: Option<u16>) -> Self {
        Self::Network {
            url: url.into(),
            message: msg.into(),
            status,
        }
    }

    /// Create a catalog parse error from any displayable message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::CatalogParse {
            message: msg.into(),
        }
    }

    /// Create an extraction error for the entry `id`.
    pub fn extraction(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            id: id.into(),
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

    /// A short cause string suitable for a per-entry summary line.
    pub fn cause(&self) -> String {
        match self {
            Self::Network {
                message, status, ..
            } => match status {
                Some(code) => format!("HTTP {code}: {message}"),
                None => message.clone(),
            },
            Self::Extraction { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = HarvestError::config("bad delay");
        assert_eq!(err.to_string(), "config error: bad delay");

        let err = HarvestError::extraction("q-1", "no SPARQL query found");
        assert_eq!(
            err.to_string(),
            "extraction error for q-1: no SPARQL query found"
        );
    }

    #[test]
    fn network_cause_includes_status() {
        let err = HarvestError::network("https://example.com/x", "Not Found", Some(404));
        assert_eq!(err.cause(), "HTTP 404: Not Found");
        assert!(err.to_string().contains("https://example.com/x"));

        let err = HarvestError::network("https://example.com/x", "connection refused", None);
        assert_eq!(err.cause(), "connection refused");
    }
}
