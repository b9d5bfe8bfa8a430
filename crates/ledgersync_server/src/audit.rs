//! Append-only audit log of accepted mutations.
//!
//! Every accepted create/update/delete appends an event capturing device,
//! user and before/after payloads. Dispute resolution on monetary records
//! depends on this trail, so events are append-only and never rewritten.

use ledgersync_protocol::{unix_millis, EntityPayload, EntityType, Operation};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// A single audit event.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// Monotonic event sequence, assigned on append.
    pub sequence: u64,
    /// When the event was recorded (Unix millis).
    pub timestamp_ms: i64,
    /// Device that submitted the mutation.
    pub device_id: Uuid,
    /// User the device was acting for.
    pub user_id: String,
    /// Entity kind.
    pub entity_type: EntityType,
    /// Entity id.
    pub entity_id: Uuid,
    /// Operation that was accepted.
    pub operation: Operation,
    /// Payload before the mutation. `None` for creates.
    pub before: Option<EntityPayload>,
    /// Payload after the mutation. Unchanged payload for deletes.
    pub after: Option<EntityPayload>,
}

impl AuditEvent {
    /// Creates an event for an accepted mutation; the sequence is assigned
    /// by the log on append.
    #[allow(clippy::too_many_arguments)]
    pub fn accepted(
        device_id: Uuid,
        user_id: impl Into<String>,
        entity_type: EntityType,
        entity_id: Uuid,
        operation: Operation,
        before: Option<EntityPayload>,
        after: Option<EntityPayload>,
    ) -> Self {
        Self {
            sequence: 0,
            timestamp_ms: unix_millis(),
            device_id,
            user_id: user_id.into(),
            entity_type,
            entity_id,
            operation,
            before,
            after,
        }
    }
}

/// Append-only audit log collaborator.
pub trait AuditLog: Send + Sync {
    /// Appends an event, assigning and returning its sequence.
    fn append(&self, event: AuditEvent) -> u64;

    /// Returns events with sequence greater than `sequence`, up to `limit`.
    fn events_since(&self, sequence: u64, limit: usize) -> Vec<AuditEvent>;

    /// Returns the number of retained events.
    fn len(&self) -> usize;

    /// Returns true if no events are retained.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory reference implementation with bounded history.
pub struct MemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
    next_sequence: AtomicU64,
    max_history: usize,
}

impl MemoryAuditLog {
    /// Creates a log retaining up to `max_history` events.
    pub fn new(max_history: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(1),
            max_history,
        }
    }

    /// Returns all events for one entity, oldest first.
    pub fn events_for_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, mut event: AuditEvent) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        event.sequence = sequence;

        let mut events = self.events.write();
        events.push(event);
        if events.len() > self.max_history {
            let excess = events.len() - self.max_history;
            events.drain(0..excess);
        }
        sequence
    }

    fn events_since(&self, sequence: u64, limit: usize) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.sequence > sequence)
            .take(limit)
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.events.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_protocol::SupplierPayload;

    fn event(name: &str) -> AuditEvent {
        AuditEvent::accepted(
            Uuid::new_v4(),
            "agent-1",
            EntityType::Supplier,
            Uuid::new_v4(),
            Operation::Create,
            None,
            Some(EntityPayload::Supplier(SupplierPayload {
                name: name.into(),
                phone: None,
                region: None,
                active: true,
            })),
        )
    }

    #[test]
    fn append_assigns_sequences() {
        let log = MemoryAuditLog::new(100);

        assert_eq!(log.append(event("a")), 1);
        assert_eq!(log.append(event("b")), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn events_since_cursor() {
        let log = MemoryAuditLog::new(100);
        for name in ["a", "b", "c"] {
            log.append(event(name));
        }

        let tail = log.events_since(1, 10);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 2);

        let limited = log.events_since(0, 2);
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn history_is_bounded() {
        let log = MemoryAuditLog::new(3);
        for i in 0..10 {
            log.append(event(&format!("e{i}")));
        }

        assert_eq!(log.len(), 3);
        // Oldest retained event is sequence 8.
        assert_eq!(log.events_since(0, 10)[0].sequence, 8);
    }

    #[test]
    fn events_for_entity() {
        let log = MemoryAuditLog::new(100);
        let tracked = event("tracked");
        let entity_id = tracked.entity_id;
        log.append(tracked);
        log.append(event("other"));

        let events = log.events_for_entity(EntityType::Supplier, entity_id);
        assert_eq!(events.len(), 1);
    }
}
