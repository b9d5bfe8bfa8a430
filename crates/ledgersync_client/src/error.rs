//! Error types for the device-side sync client.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur on the device side.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Durable storage failure. Fatal for the operation; the caller must
    /// not treat the mutation as captured.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Encoding or decoding failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Protocol violation (malformed response, result count mismatch).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server rejected the request as a whole.
    #[error("server error: {0}")]
    Server(String),

    /// A push batch is already outstanding.
    #[error("a push is already in flight")]
    PushInFlight,

    /// A pull is already outstanding.
    #[error("a pull is already in flight")]
    PullInFlight,

    /// Invalid mutation record.
    #[error("invalid mutation: {0}")]
    InvalidMutation(#[from] ledgersync_protocol::ProtocolError),

    /// Entity referenced by a local mutation does not exist locally.
    #[error("unknown local entity: {0}")]
    UnknownLocalEntity(uuid::Uuid),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Server(_) => true,
            _ => false,
        }
    }
}
