//! Error types for the protocol crate.

use crate::entity::EntityType;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while validating or encoding protocol types.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A mutation record violates the protocol contract.
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    /// A payload's kind does not match the declared entity type.
    #[error("payload mismatch: declared {declared:?}, payload is {found:?}")]
    PayloadMismatch {
        /// Entity type declared on the record.
        declared: EntityType,
        /// Entity type of the attached payload.
        found: EntityType,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
