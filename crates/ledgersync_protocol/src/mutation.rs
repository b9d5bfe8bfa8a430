//! Mutation records: the unit exchanged between device and server.

use crate::entity::{EntityPayload, EntityType};
use crate::error::{ProtocolError, ProtocolResult};
use crate::time::unix_millis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of mutation applied to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Entity is created.
    Create,
    /// Entity fields are replaced.
    Update,
    /// Entity is tombstoned.
    Delete,
}

/// A single captured local change, as pushed to the server.
///
/// `base_version` is the version the device believed was current when it
/// made the change (0 for create). The server compares it against the
/// stored version to detect lost updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Entity kind.
    pub entity_type: EntityType,
    /// Entity id.
    pub entity_id: Uuid,
    /// Operation kind.
    pub operation: Operation,
    /// Version the device observed before mutating; 0 for create.
    pub base_version: u64,
    /// Client-generated token making a retried monetary create a no-op.
    /// Only valid on Collection and Payment creates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// New payload. `None` for delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EntityPayload>,
    /// Device-local capture time (Unix millis). Informational only; the
    /// server never uses it for ordering.
    pub client_timestamp_ms: i64,
    /// Device that captured the mutation.
    pub device_id: Uuid,
}

impl MutationRecord {
    /// Creates a create mutation.
    pub fn create(device_id: Uuid, entity_id: Uuid, payload: EntityPayload) -> Self {
        Self {
            entity_type: payload.entity_type(),
            entity_id,
            operation: Operation::Create,
            base_version: 0,
            idempotency_key: None,
            payload: Some(payload),
            client_timestamp_ms: unix_millis(),
            device_id,
        }
    }

    /// Creates an update mutation against an observed version.
    pub fn update(
        device_id: Uuid,
        entity_id: Uuid,
        base_version: u64,
        payload: EntityPayload,
    ) -> Self {
        Self {
            entity_type: payload.entity_type(),
            entity_id,
            operation: Operation::Update,
            base_version,
            idempotency_key: None,
            payload: Some(payload),
            client_timestamp_ms: unix_millis(),
            device_id,
        }
    }

    /// Creates a delete mutation against an observed version.
    pub fn delete(
        device_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        base_version: u64,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            operation: Operation::Delete,
            base_version,
            idempotency_key: None,
            payload: None,
            client_timestamp_ms: unix_millis(),
            device_id,
        }
    }

    /// Attaches an idempotency key. Valid only on monetary creates.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Validates the protocol contract for this record.
    pub fn validate(&self) -> ProtocolResult<()> {
        if let Some(payload) = &self.payload {
            let found = payload.entity_type();
            if found != self.entity_type {
                return Err(ProtocolError::PayloadMismatch {
                    declared: self.entity_type,
                    found,
                });
            }
        }

        match self.operation {
            Operation::Create => {
                if self.base_version != 0 {
                    return Err(ProtocolError::InvalidMutation(
                        "create must have base_version 0".into(),
                    ));
                }
                if self.payload.is_none() {
                    return Err(ProtocolError::InvalidMutation(
                        "create requires a payload".into(),
                    ));
                }
            }
            Operation::Update => {
                if self.base_version == 0 {
                    return Err(ProtocolError::InvalidMutation(
                        "update requires base_version >= 1".into(),
                    ));
                }
                if self.payload.is_none() {
                    return Err(ProtocolError::InvalidMutation(
                        "update requires a payload".into(),
                    ));
                }
            }
            Operation::Delete => {
                if self.base_version == 0 {
                    return Err(ProtocolError::InvalidMutation(
                        "delete requires base_version >= 1".into(),
                    ));
                }
                if self.payload.is_some() {
                    return Err(ProtocolError::InvalidMutation(
                        "delete must not carry a payload".into(),
                    ));
                }
            }
        }

        if self.idempotency_key.is_some()
            && (self.operation != Operation::Create || !self.entity_type.is_monetary())
        {
            return Err(ProtocolError::InvalidMutation(
                "idempotency key is only valid on collection/payment creates".into(),
            ));
        }

        Ok(())
    }
}
