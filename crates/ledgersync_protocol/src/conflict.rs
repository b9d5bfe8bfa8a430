//! Conflict records and resolution strategies.

use crate::entity::{EntityPayload, EntityType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A detected conflict between a pushed mutation and the stored entity.
///
/// Produced when a push carries `base_version < stored_version`. Never
/// silently dropped: conflicts are surfaced to an operator or resolved
/// explicitly with a [`ResolutionStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Entity kind.
    pub entity_type: EntityType,
    /// Entity in conflict.
    pub entity_id: Uuid,
    /// Version stored on the server when the conflict was detected.
    pub server_version: u64,
    /// Version the client based its mutation on.
    pub client_version: u64,
    /// Server payload at detection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_payload: Option<EntityPayload>,
    /// Client payload that was rejected. `None` for a rejected delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_payload: Option<EntityPayload>,
}

impl ConflictRecord {
    /// Returns true if the client side of the conflict was a delete.
    pub fn is_delete_conflict(&self) -> bool {
        self.client_payload.is_none()
    }
}

/// How to resolve a conflict once a decision has been made.
///
/// Automatic field-level merging of monetary data is unsafe, so `Merge`
/// requires the caller to supply the merged payload explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Discard the client payload; the server entity stands.
    ServerWins,
    /// Apply the client payload on top of the server entity.
    ClientWins,
    /// Apply an explicitly supplied merged payload.
    Merge(EntityPayload),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SupplierPayload;

    fn supplier(name: &str) -> EntityPayload {
        EntityPayload::Supplier(SupplierPayload {
            name: name.into(),
            phone: None,
            region: None,
            active: true,
        })
    }

    #[test]
    fn delete_conflict_detection() {
        let conflict = ConflictRecord {
            entity_type: EntityType::Supplier,
            entity_id: Uuid::new_v4(),
            server_version: 3,
            client_version: 2,
            server_payload: Some(supplier("server")),
            client_payload: None,
        };
        assert!(conflict.is_delete_conflict());
    }

    #[test]
    fn strategy_roundtrip() {
        let strategy = ResolutionStrategy::Merge(supplier("merged"));
        let json = serde_json::to_string(&strategy).unwrap();
        let back: ResolutionStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, strategy);

        let json = serde_json::to_value(ResolutionStrategy::ServerWins).unwrap();
        assert_eq!(json, "server_wins");
    }
}
