//! Error types for Nimbus
//!
//! Provides a unified error type shared by the metadata store, the dispatcher,
//! and the storage agent.

use thiserror::Error;

/// Result type alias for Nimbus operations.
pub type Result<T> = std::result::Result<T, NimbusError>;

/// Unified error type for Nimbus.
#[derive(Error, Debug)]
pub enum NimbusError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("unknown file: {0}")]
    UnknownFile(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid chunk id: {0}")]
    InvalidChunkId(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("snapshot corrupted: {0}")]
    SnapshotCorrupted(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for NimbusError {
    fn from(err: serde_json::Error) -> Self {
        NimbusError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NimbusError::UnknownNode("n1".into());
        assert_eq!(err.to_string(), "unknown node: n1");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NimbusError = io_err.into();
        assert!(matches!(err, NimbusError::Io(_)));
    }
}
