//! Conflict resolution engine.
//!
//! Conflicts are only *reported* at push time; this module is used when a
//! conflict is being explicitly resolved, by an operator or by policy.

use ledgersync_protocol::{
    unix_millis, ConflictRecord, EntityRecord, ResolutionStrategy,
};

/// Resolves a conflict against the current server entity.
///
/// Pure decision function: nothing is persisted here.
///
/// - `ServerWins` discards the client payload; the server entity is
///   returned unchanged, version untouched (idempotent if invoked twice).
/// - `ClientWins` applies the conflicting client payload on top of the
///   server entity. A client-side delete conflict tombstones the entity.
/// - `Merge` applies an explicitly supplied merged payload — automatic
///   field-level merging of monetary data is unsafe, so the caller decides.
///
/// The version strictly increases exactly when the resulting state
/// differs from the server's, and never decreases.
pub fn resolve(
    server: &EntityRecord,
    conflict: &ConflictRecord,
    strategy: &ResolutionStrategy,
) -> EntityRecord {
    match strategy {
        ResolutionStrategy::ServerWins => server.clone(),
        ResolutionStrategy::ClientWins => match &conflict.client_payload {
            Some(payload) => apply_payload(server, payload),
            None => apply_delete(server),
        },
        ResolutionStrategy::Merge(payload) => apply_payload(server, payload),
    }
}

fn apply_payload(server: &EntityRecord, payload: &ledgersync_protocol::EntityPayload) -> EntityRecord {
    if &server.payload == payload && !server.is_deleted() {
        // No state change: keep the version untouched.
        return server.clone();
    }
    let mut resolved = server.with_payload(payload.clone(), unix_millis());
    // Resolving in favor of a live payload revives a tombstoned entity.
    resolved.deleted_at_ms = None;
    resolved
}

fn apply_delete(server: &EntityRecord) -> EntityRecord {
    if server.is_deleted() {
        return server.clone();
    }
    server.with_tombstone(unix_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_protocol::{EntityPayload, EntityType, SupplierPayload};
    use uuid::Uuid;

    fn supplier(name: &str) -> EntityPayload {
        EntityPayload::Supplier(SupplierPayload {
            name: name.into(),
            phone: None,
            region: None,
            active: true,
        })
    }

    fn server_record(name: &str, version: u64) -> EntityRecord {
        let mut record = EntityRecord::created(Uuid::new_v4(), supplier(name), 1000);
        record.version = version;
        record
    }

    fn conflict_for(server: &EntityRecord, client_payload: Option<EntityPayload>) -> ConflictRecord {
        ConflictRecord {
            entity_type: EntityType::Supplier,
            entity_id: server.entity_id,
            server_version: server.version,
            client_version: server.version - 1,
            server_payload: Some(server.payload.clone()),
            client_payload,
        }
    }

    #[test]
    fn server_wins_is_idempotent() {
        let server = server_record("server", 3);
        let conflict = conflict_for(&server, Some(supplier("client")));

        let once = resolve(&server, &conflict, &ResolutionStrategy::ServerWins);
        let twice = resolve(&once, &conflict, &ResolutionStrategy::ServerWins);

        assert_eq!(once, server);
        assert_eq!(twice, server);
        assert_eq!(once.version, 3);
    }

    #[test]
    fn client_wins_bumps_version() {
        let server = server_record("server", 3);
        let conflict = conflict_for(&server, Some(supplier("client")));

        let resolved = resolve(&server, &conflict, &ResolutionStrategy::ClientWins);

        assert_eq!(resolved.version, 4);
        assert_eq!(resolved.payload, supplier("client"));
    }

    #[test]
    fn client_wins_with_identical_payload_keeps_version() {
        let server = server_record("same", 3);
        let conflict = conflict_for(&server, Some(supplier("same")));

        let resolved = resolve(&server, &conflict, &ResolutionStrategy::ClientWins);
        assert_eq!(resolved.version, 3);
    }

    #[test]
    fn client_delete_conflict_tombstones() {
        let server = server_record("server", 2);
        let conflict = conflict_for(&server, None);

        let resolved = resolve(&server, &conflict, &ResolutionStrategy::ClientWins);

        assert!(resolved.is_deleted());
        assert_eq!(resolved.version, 3);

        // Resolving the same delete again does not bump further.
        let again = resolve(&resolved, &conflict, &ResolutionStrategy::ClientWins);
        assert_eq!(again.version, 3);
    }

    #[test]
    fn merge_applies_supplied_payload() {
        let server = server_record("server", 5);
        let conflict = conflict_for(&server, Some(supplier("client")));

        let resolved = resolve(
            &server,
            &conflict,
            &ResolutionStrategy::Merge(supplier("merged")),
        );

        assert_eq!(resolved.version, 6);
        assert_eq!(resolved.payload, supplier("merged"));
    }

    #[test]
    fn resolution_revives_tombstoned_entity() {
        let server = server_record("server", 2).with_tombstone(2000);
        let conflict = conflict_for(&server, Some(supplier("client")));

        let resolved = resolve(&server, &conflict, &ResolutionStrategy::ClientWins);

        assert!(!resolved.is_deleted());
        assert_eq!(resolved.version, 4);
    }

    #[test]
    fn version_never_decreases() {
        let server = server_record("server", 7);
        let conflict = conflict_for(&server, Some(supplier("client")));

        for strategy in [
            ResolutionStrategy::ServerWins,
            ResolutionStrategy::ClientWins,
            ResolutionStrategy::Merge(supplier("merged")),
        ] {
            let resolved = resolve(&server, &conflict, &strategy);
            assert!(resolved.version >= server.version);
        }
    }
}
