//! Device-local entity store.

use crate::error::{ClientError, ClientResult};
use ledgersync_protocol::{
    unix_millis, EntityRecord, EntityType, MutationRecord, Operation,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// The device's local copy of entities, plus its pull watermark.
///
/// Remote entities apply with last-write-wins by version: an incoming
/// version lower than the local one can only be the echo of a mutation
/// this device itself just pushed, and is ignored.
pub struct LocalStore {
    entities: RwLock<HashMap<(EntityType, Uuid), EntityRecord>>,
    watermark: AtomicU64,
}

impl LocalStore {
    /// Creates an empty store with watermark 0.
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            watermark: AtomicU64::new(0),
        }
    }

    /// Returns the local copy of an entity, tombstones included.
    pub fn get(&self, entity_type: EntityType, entity_id: Uuid) -> Option<EntityRecord> {
        self.entities.read().get(&(entity_type, entity_id)).cloned()
    }

    /// Applies pulled entities with last-write-wins by version.
    /// Returns how many were applied (rest kept local).
    pub fn apply_remote(&self, records: &[EntityRecord]) -> usize {
        let mut entities = self.entities.write();
        let mut applied = 0;

        for incoming in records {
            let key = (incoming.entity_type, incoming.entity_id);
            let overwrite = entities
                .get(&key)
                .map(|local| incoming.version >= local.version)
                .unwrap_or(true);

            if overwrite {
                entities.insert(key, incoming.clone());
                applied += 1;
            }
        }

        applied
    }

    /// Applies a local mutation optimistically, so the device sees its
    /// own change before the server accepts it. The authoritative version
    /// arrives later via pull.
    pub fn stage_local(&self, record: &MutationRecord) -> ClientResult<()> {
        let key = (record.entity_type, record.entity_id);
        let mut entities = self.entities.write();
        let now = unix_millis();

        match record.operation {
            Operation::Create => {
                let payload = record
                    .payload
                    .clone()
                    .ok_or_else(|| ClientError::Protocol("create without payload".into()))?;
                entities.insert(key, EntityRecord::created(record.entity_id, payload, now));
            }
            Operation::Update => {
                let payload = record
                    .payload
                    .clone()
                    .ok_or_else(|| ClientError::Protocol("update without payload".into()))?;
                let local = entities
                    .get(&key)
                    .ok_or(ClientError::UnknownLocalEntity(record.entity_id))?;
                let staged = local.with_payload(payload, now);
                entities.insert(key, staged);
            }
            Operation::Delete => {
                let local = entities
                    .get(&key)
                    .ok_or(ClientError::UnknownLocalEntity(record.entity_id))?;
                let staged = local.with_tombstone(now);
                entities.insert(key, staged);
            }
        }

        Ok(())
    }

    /// The device's pull watermark.
    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::SeqCst)
    }

    /// Advances the watermark. Called only after an entire pull batch
    /// applied without error.
    pub fn set_watermark(&self, watermark: u64) {
        self.watermark.store(watermark, Ordering::SeqCst);
    }

    /// Returns all live (non-tombstoned) entities of a type.
    pub fn live_entities(&self, entity_type: EntityType) -> Vec<EntityRecord> {
        self.entities
            .read()
            .values()
            .filter(|r| r.entity_type == entity_type && !r.is_deleted())
            .cloned()
            .collect()
    }

    /// Number of stored entities, tombstones included.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns true if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}
