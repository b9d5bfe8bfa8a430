//! Persistence collaborator for entity state.

use crate::error::{ServerError, ServerResult};
use ledgersync_protocol::{EntityRecord, EntityType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Storage interface consumed by the push and pull handlers.
///
/// Implementations must make [`EntityStore::insert`] and
/// [`EntityStore::update_with_version_check`] atomic: the version column is
/// the optimistic-concurrency guard, so two concurrent writers observing
/// the same stored version must not both succeed. Every accepted write is
/// stamped with a fresh commit sequence from a single monotonic counter.
pub trait EntityStore: Send + Sync {
    /// Returns the current state of an entity, tombstones included.
    fn get(&self, entity_type: EntityType, entity_id: Uuid) -> Option<EntityRecord>;

    /// Inserts a new entity at version 1, registering its idempotency key
    /// if present. Fails with [`ServerError::AlreadyExists`] if the id is
    /// taken. Returns the stored record with its commit sequence assigned.
    fn insert(
        &self,
        record: EntityRecord,
        idempotency_key: Option<&str>,
    ) -> ServerResult<EntityRecord>;

    /// Replaces an entity's state if its stored version still equals
    /// `expected_version`. Returns the stored record on success, `None` if
    /// the check failed (a concurrent writer won).
    fn update_with_version_check(
        &self,
        record: EntityRecord,
        expected_version: u64,
    ) -> ServerResult<Option<EntityRecord>>;

    /// Looks up the entity created under an idempotency key.
    fn find_by_idempotency_key(&self, key: &str) -> Option<EntityRecord>;

    /// Returns entities with a commit sequence greater than `watermark`,
    /// ordered by sequence, optionally filtered by entity type.
    fn changed_since(
        &self,
        watermark: u64,
        entity_types: Option<&[EntityType]>,
    ) -> Vec<EntityRecord>;

    /// Returns the last assigned commit sequence.
    fn current_sequence(&self) -> u64;
}

/// In-memory reference implementation of [`EntityStore`].
///
/// A single write lock over the entity map plays the role of the
/// per-entity row lock: a check-and-write never interleaves with another
/// writer for the same entity.
pub struct MemoryEntityStore {
    entities: RwLock<HashMap<(EntityType, Uuid), EntityRecord>>,
    idempotency: RwLock<HashMap<String, (EntityType, Uuid)>>,
    sequence: AtomicU64,
}

impl MemoryEntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            idempotency: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns the number of stored entities, tombstones included.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns true if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MemoryEntityStore {
    fn get(&self, entity_type: EntityType, entity_id: Uuid) -> Option<EntityRecord> {
        self.entities.read().get(&(entity_type, entity_id)).cloned()
    }

    fn insert(
        &self,
        mut record: EntityRecord,
        idempotency_key: Option<&str>,
    ) -> ServerResult<EntityRecord> {
        let key = (record.entity_type, record.entity_id);
        let mut entities = self.entities.write();

        if entities.contains_key(&key) {
            return Err(ServerError::AlreadyExists {
                entity_type: record.entity_type,
                entity_id: record.entity_id,
            });
        }

        record.sequence = self.next_sequence();
        if let Some(token) = idempotency_key {
            self.idempotency.write().insert(token.to_string(), key);
        }
        entities.insert(key, record.clone());
        Ok(record)
    }

    fn update_with_version_check(
        &self,
        mut record: EntityRecord,
        expected_version: u64,
    ) -> ServerResult<Option<EntityRecord>> {
        let key = (record.entity_type, record.entity_id);
        let mut entities = self.entities.write();

        let stored = entities.get(&key).ok_or(ServerError::NotFound {
            entity_type: record.entity_type,
            entity_id: record.entity_id,
        })?;

        if stored.version != expected_version {
            return Ok(None);
        }

        record.sequence = self.next_sequence();
        entities.insert(key, record.clone());
        Ok(Some(record))
    }

    fn find_by_idempotency_key(&self, key: &str) -> Option<EntityRecord> {
        let target = *self.idempotency.read().get(key)?;
        self.entities.read().get(&target).cloned()
    }

    fn changed_since(
        &self,
        watermark: u64,
        entity_types: Option<&[EntityType]>,
    ) -> Vec<EntityRecord> {
        let entities = self.entities.read();
        let mut changed: Vec<EntityRecord> = entities
            .values()
            .filter(|record| record.sequence > watermark)
            .filter(|record| {
                entity_types
                    .map(|types| types.contains(&record.entity_type))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        changed.sort_by_key(|record| record.sequence);
        changed
    }

    fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
