//! Crate-wide error definitions.
//!
//! # Responsibilities
//! - Distinguish transient failures (connection, storage read) from terminal
//!   ones (configuration, durable-store corruption)
//! - Carry the last underlying cause through retry exhaustion

use thiserror::Error;

use crate::rpc::RpcError;
use crate::store::StoreError;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Endpoint unreachable or connection could not be opened.
    #[error("connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: RpcError,
    },

    /// A storage read or chain call raised.
    #[error("query {what} failed: {source}")]
    Query {
        what: String,
        #[source]
        source: RpcError,
    },

    /// No URL candidates, invalid partition, missing signer, bad config file.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Durable key/value store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Whether a retry policy may re-attempt the failed operation.
    ///
    /// Connection and query failures are indistinguishable at the retry
    /// layer; configuration and store errors are raised immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Connection { .. } | ClientError::Query { .. })
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let err = ClientError::Connection {
            url: "ws://node:9944".into(),
            source: RpcError::Transport("refused".into()),
        };
        assert!(err.is_retryable());

        let err = ClientError::Query {
            what: "Ledger.Stake".into(),
            source: RpcError::Storage("decode failed".into()),
        };
        assert!(err.is_retryable());

        let err = ClientError::Configuration("no urls for network main".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Connection {
            url: "ws://node:9944".into(),
            source: RpcError::Transport("refused".into()),
        };
        assert!(err.to_string().contains("ws://node:9944"));
        assert!(err.to_string().contains("refused"));
    }
}
