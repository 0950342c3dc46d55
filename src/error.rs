//! Error types for a3s-connectable

use thiserror::Error;

/// Errors that can occur in the connectable pipeline
#[derive(Debug, Error)]
pub enum StreamError {
    /// Operation not allowed in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Error signalled by an upstream producer
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Error raised by an underlying source, kept with its cause
    #[error("Source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No async runtime available to run continuations
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl StreamError {
    /// Shorthand for an upstream error with a message
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Wrap any error as a source error
    pub fn source(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Source(Box::new(err))
    }
}

/// Result type alias for connectable operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StreamError::InvalidState("already connected".to_string());
        assert_eq!(err.to_string(), "Invalid state: already connected");

        let err = StreamError::upstream("boom");
        assert_eq!(err.to_string(), "Upstream error: boom");
    }

    #[test]
    fn test_source_error_keeps_cause() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = StreamError::source(io);
        assert!(err.to_string().contains("pipe closed"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_serialization_error_from() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StreamError = parse.into();
        assert!(matches!(err, StreamError::Serialization(_)));
    }
}
