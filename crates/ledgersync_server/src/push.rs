//! Push handler: accepts one batch of mutations from one device.

use crate::audit::{AuditEvent, AuditLog};
use crate::authz::Authorizer;
use crate::error::{ServerError, ServerResult};
use crate::store::EntityStore;
use ledgersync_protocol::{
    unix_millis, EntityRecord, MutationRecord, Operation, PushRequest, PushResponse, PushResult,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Applies each mutation of a push batch independently.
///
/// Partial success is the normal case: one rejected operation never rolls
/// back or blocks the others. The response carries one result per
/// submitted operation, in the order received.
pub struct PushHandler {
    store: Arc<dyn EntityStore>,
    audit: Arc<dyn AuditLog>,
    authz: Arc<dyn Authorizer>,
    max_batch: usize,
}

impl PushHandler {
    /// Creates a push handler.
    pub fn new(
        store: Arc<dyn EntityStore>,
        audit: Arc<dyn AuditLog>,
        authz: Arc<dyn Authorizer>,
        max_batch: usize,
    ) -> Self {
        Self {
            store,
            audit,
            authz,
            max_batch,
        }
    }

    /// Handles a push batch for the given user.
    pub fn handle(&self, user: &str, request: &PushRequest) -> ServerResult<PushResponse> {
        if request.operations.len() > self.max_batch {
            return Err(ServerError::InvalidRequest(format!(
                "push batch too large: {} > {}",
                request.operations.len(),
                self.max_batch
            )));
        }

        let results: Vec<PushResult> = request
            .operations
            .iter()
            .map(|op| self.apply_one(user, op))
            .collect();

        debug!(
            device = %request.device_id,
            operations = request.operations.len(),
            accepted = results.iter().filter(|r| r.status.is_ack()).count(),
            "push batch applied"
        );

        Ok(PushResponse::new(results))
    }

    /// Applies a single mutation. Never fails the batch: every outcome,
    /// including corruption, is reported as a per-operation result.
    fn apply_one(&self, user: &str, op: &MutationRecord) -> PushResult {
        if let Err(err) = op.validate() {
            return PushResult::error(op.entity_id, err.to_string());
        }

        if !self.authz.may_push(user, op) {
            return PushResult::error(op.entity_id, "not authorized");
        }

        // Idempotent replay: the same logical operation was already
        // persisted, regardless of how often the transport retried it.
        if let Some(key) = &op.idempotency_key {
            if let Some(existing) = self.store.find_by_idempotency_key(key) {
                return PushResult::exists(existing.entity_id, existing.version);
            }
        }

        match self.store.get(op.entity_type, op.entity_id) {
            None => self.apply_create(user, op),
            Some(stored) => self.apply_versioned(user, op, stored),
        }
    }

    /// The entity id is unknown server-side: this is a create, whatever
    /// operation the record declared.
    fn apply_create(&self, user: &str, op: &MutationRecord) -> PushResult {
        let Some(payload) = &op.payload else {
            // A delete for an entity the server has never seen carries no
            // payload to create from.
            return PushResult::error(op.entity_id, "delete of unknown entity");
        };

        let record = EntityRecord::created(op.entity_id, payload.clone(), unix_millis());

        match self.store.insert(record, op.idempotency_key.as_deref()) {
            Ok(stored) => {
                self.audit.append(AuditEvent::accepted(
                    op.device_id,
                    user,
                    op.entity_type,
                    op.entity_id,
                    Operation::Create,
                    None,
                    Some(stored.payload.clone()),
                ));
                PushResult::created(stored.entity_id, stored.version)
            }
            Err(ServerError::AlreadyExists { .. }) => {
                // A concurrent create won the insert race.
                self.conflict_with_stored(op)
            }
            Err(err) => PushResult::error(op.entity_id, err.to_string()),
        }
    }

    /// The entity exists: gate the mutation on its version.
    fn apply_versioned(&self, user: &str, op: &MutationRecord, stored: EntityRecord) -> PushResult {
        if op.base_version == stored.version {
            let now = unix_millis();
            let updated = match op.operation {
                Operation::Delete => stored.with_tombstone(now),
                _ => match &op.payload {
                    Some(payload) => stored.with_payload(payload.clone(), now),
                    None => {
                        return PushResult::error(op.entity_id, "update requires a payload");
                    }
                },
            };

            match self.store.update_with_version_check(updated, stored.version) {
                Ok(Some(applied)) => {
                    self.audit.append(AuditEvent::accepted(
                        op.device_id,
                        user,
                        op.entity_type,
                        op.entity_id,
                        op.operation,
                        Some(stored.payload.clone()),
                        Some(applied.payload.clone()),
                    ));
                    PushResult::updated(applied.entity_id, applied.version)
                }
                // A concurrent push for the same entity won the version
                // check between our read and write.
                Ok(None) => self.conflict_with_stored(op),
                Err(err) => PushResult::error(op.entity_id, err.to_string()),
            }
        } else if op.base_version < stored.version {
            PushResult::conflict(op.entity_id, stored.version, stored.payload)
        } else {
            // base_version > stored_version is unreachable under correct
            // client behavior; treat as corruption and never guess.
            warn!(
                entity = %op.entity_id,
                base_version = op.base_version,
                stored_version = stored.version,
                "base_version ahead of stored version"
            );
            PushResult::error(
                op.entity_id,
                format!(
                    "corrupt base_version {} ahead of stored version {}",
                    op.base_version, stored.version
                ),
            )
        }
    }

    fn conflict_with_stored(&self, op: &MutationRecord) -> PushResult {
        match self.store.get(op.entity_type, op.entity_id) {
            Some(stored) => PushResult::conflict(op.entity_id, stored.version, stored.payload),
            None => PushResult::error(op.entity_id, "entity vanished during push"),
        }
    }
}
