//! Error types for bodhi-chat
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for bodhi-chat operations
///
/// Covers configuration loading, the HTTP transport to the completion
/// server, errors reported inside an event stream, and storage access.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server answered with a non-success HTTP status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code returned by the server
        status: u16,
        /// Message taken from `error.message` or a call-site fallback
        message: String,
    },

    /// The server embedded an error object inside an event stream
    #[error("Upstream error during stream: {message}")]
    UpstreamStream {
        /// Error message reported by the server
        message: String,
        /// Assistant content accumulated before the error arrived
        partial: String,
    },

    /// No bytes arrived within the configured idle timeout
    #[error("Stream stalled: no data received for {0} seconds")]
    StreamTimeout(u64),

    /// The caller cancelled an in-flight completion
    #[error("Completion cancelled")]
    Cancelled {
        /// Assistant content accumulated before cancellation
        partial: String,
    },

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Requested chat or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key/value storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport errors (connection refused, reset, TLS)
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ChatError {
    /// Content accumulated before the failure, when the failure happened mid-stream
    pub fn partial_content(&self) -> Option<&str> {
        match self {
            Self::UpstreamStream { partial, .. } | Self::Cancelled { partial } => Some(partial),
            _ => None,
        }
    }
}

/// Result type alias for bodhi-chat operations
///
/// Uses `anyhow::Error` so callers get context chains; downcast to
/// [`ChatError`] when the variant matters.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ChatError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_api_error_display() {
        let error = ChatError::Api {
            status: 503,
            message: "model is loading".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "API error (status 503): model is loading"
        );
    }

    #[test]
    fn test_upstream_error_keeps_partial() {
        let error = ChatError::UpstreamStream {
            message: "context overflow".to_string(),
            partial: "Once upon".to_string(),
        };
        assert!(error.to_string().contains("context overflow"));
        assert_eq!(error.partial_content(), Some("Once upon"));
    }

    #[test]
    fn test_cancelled_keeps_partial() {
        let error = ChatError::Cancelled {
            partial: "Hel".to_string(),
        };
        assert_eq!(error.to_string(), "Completion cancelled");
        assert_eq!(error.partial_content(), Some("Hel"));
    }

    #[test]
    fn test_partial_content_none_for_other_variants() {
        assert!(ChatError::StreamTimeout(30).partial_content().is_none());
        assert!(ChatError::NotFound("x".into()).partial_content().is_none());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: ChatError = io_error.into();
        assert!(matches!(error, ChatError::Io(_)));
    }

    #[test]
    fn test_serde_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: ChatError = err.into();
        assert!(error.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn test_downcast_from_anyhow() {
        let result: Result<()> = Err(ChatError::StreamTimeout(5).into());
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::StreamTimeout(5))
        ));
    }
}
