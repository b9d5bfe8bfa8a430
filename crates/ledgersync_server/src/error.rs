//! Error types for the sync server.

use ledgersync_protocol::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
///
/// Per-operation outcomes (conflict, idempotent replay, corruption) are
/// reported inside [`ledgersync_protocol::PushResponse`] results and are
/// deliberately not errors: they never abort a batch.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request (oversized batch, malformed record).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Device is not registered.
    #[error("unknown device: {0}")]
    UnknownDevice(Uuid),

    /// Caller is not allowed to perform the operation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Entity already exists (concurrent create).
    #[error("entity already exists: {entity_type:?}/{entity_id}")]
    AlreadyExists {
        /// Entity kind.
        entity_type: EntityType,
        /// Entity id.
        entity_id: Uuid,
    },

    /// Entity does not exist.
    #[error("entity not found: {entity_type:?}/{entity_id}")]
    NotFound {
        /// Entity kind.
        entity_type: EntityType,
        /// Entity id.
        entity_id: Uuid,
    },

    /// A conflict resolution raced with a concurrent accepted mutation.
    #[error("resolution raced with a concurrent update for {entity_id}")]
    ResolutionRaced {
        /// Entity id.
        entity_id: Uuid,
    },

    /// Storage collaborator failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::UnknownDevice(_)
                | ServerError::NotAuthorized(_)
                | ServerError::AlreadyExists { .. }
                | ServerError::NotFound { .. }
                | ServerError::ResolutionRaced { .. }
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Storage(_) | ServerError::Internal(_))
    }
}
