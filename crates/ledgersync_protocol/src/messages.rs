//! Push and pull wire messages.

use crate::entity::{EntityPayload, EntityRecord, EntityType};
use crate::mutation::MutationRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Push request: one bounded batch of mutations from one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    /// Device submitting the batch.
    pub device_id: Uuid,
    /// Mutations, in capture order.
    pub operations: Vec<MutationRecord>,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(device_id: Uuid, operations: Vec<MutationRecord>) -> Self {
        Self {
            device_id,
            operations,
        }
    }
}

/// Per-operation outcome of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    /// Entity did not exist; persisted at version 1.
    Created,
    /// Version check passed; mutation applied.
    Updated,
    /// Idempotent replay of an already-persisted operation.
    Exists,
    /// Version check failed; stored state untouched.
    Conflict,
    /// Operation rejected (authorization, corruption, bad record).
    Error,
}

impl OpStatus {
    /// Returns true if the server definitively persisted this operation
    /// (now or on an earlier attempt).
    pub fn is_ack(&self) -> bool {
        matches!(self, OpStatus::Created | OpStatus::Updated | OpStatus::Exists)
    }
}

/// Result of a single pushed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResult {
    /// Entity the operation targeted.
    pub entity_id: Uuid,
    /// Outcome.
    pub status: OpStatus,
    /// Stored version after (or despite) the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Server payload, returned on conflict so the device can resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_payload: Option<EntityPayload>,
    /// Human-readable detail for `Error` results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PushResult {
    /// A `created` result.
    pub fn created(entity_id: Uuid, version: u64) -> Self {
        Self {
            entity_id,
            status: OpStatus::Created,
            version: Some(version),
            server_payload: None,
            message: None,
        }
    }

    /// An `updated` result.
    pub fn updated(entity_id: Uuid, version: u64) -> Self {
        Self {
            entity_id,
            status: OpStatus::Updated,
            version: Some(version),
            server_payload: None,
            message: None,
        }
    }

    /// An `exists` result for an idempotent replay.
    pub fn exists(entity_id: Uuid, version: u64) -> Self {
        Self {
            entity_id,
            status: OpStatus::Exists,
            version: Some(version),
            server_payload: None,
            message: None,
        }
    }

    /// A `conflict` result carrying the server's state.
    pub fn conflict(entity_id: Uuid, server_version: u64, server_payload: EntityPayload) -> Self {
        Self {
            entity_id,
            status: OpStatus::Conflict,
            version: Some(server_version),
            server_payload: Some(server_payload),
            message: None,
        }
    }

    /// An `error` result.
    pub fn error(entity_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            entity_id,
            status: OpStatus::Error,
            version: None,
            server_payload: None,
            message: Some(message.into()),
        }
    }
}

/// Push response: one result per submitted operation, same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    /// Per-operation results.
    pub results: Vec<PushResult>,
}

impl PushResponse {
    /// Creates a new push response.
    pub fn new(results: Vec<PushResult>) -> Self {
        Self { results }
    }
}

/// Pull request: a device asking for everything changed after its watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// Requesting device.
    pub device_id: Uuid,
    /// High-water mark of the device's last fully-applied pull.
    pub watermark: u64,
    /// Optional entity-type filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<EntityType>>,
}

impl PullRequest {
    /// Creates a pull request for all entity types.
    pub fn new(device_id: Uuid, watermark: u64) -> Self {
        Self {
            device_id,
            watermark,
            entity_types: None,
        }
    }

    /// Restricts the pull to the given entity types.
    pub fn with_entity_types(mut self, entity_types: Vec<EntityType>) -> Self {
        self.entity_types = Some(entity_types);
        self
    }
}

/// Pull response: changed entities (tombstones included) and a new watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    /// Entities changed since the requested watermark.
    pub entities: Vec<EntityRecord>,
    /// Watermark to use for the next pull.
    pub new_watermark: u64,
    /// Whether more changes remain beyond this batch.
    pub has_more: bool,
}

impl PullResponse {
    /// Creates a new pull response.
    pub fn new(entities: Vec<EntityRecord>, new_watermark: u64, has_more: bool) -> Self {
        Self {
            entities,
            new_watermark,
            has_more,
        }
    }
}
