//! Property tests for the optimistic-concurrency gate.

use ledgersync_protocol::{
    EntityPayload, MutationRecord, OpStatus, PushRequest, SupplierPayload,
};
use ledgersync_server::{ServerConfig, SyncServer};
use proptest::prelude::*;
use uuid::Uuid;

fn supplier(name: &str) -> EntityPayload {
    EntityPayload::Supplier(SupplierPayload {
        name: name.into(),
        phone: None,
        region: None,
        active: true,
    })
}

proptest! {
    /// For any sequence of pushes carrying arbitrary base versions, the
    /// stored version only ever advances by exactly 1 per accepted
    /// mutation, conflicts and corruption never mutate stored state, and
    /// each outcome is fully determined by base_version vs stored version.
    #[test]
    fn version_gate_is_total_and_monotonic(guesses in prop::collection::vec(0u64..8, 1..40)) {
        let server = SyncServer::new(ServerConfig::default());
        let device = Uuid::new_v4();
        server.register_device(device, "agent-1").unwrap();

        let entity_id = Uuid::new_v4();
        let created = server
            .handle_push(
                "agent-1",
                &PushRequest::new(device, vec![MutationRecord::create(
                    device,
                    entity_id,
                    supplier("seed"),
                )]),
            )
            .unwrap();
        prop_assert_eq!(created.results[0].status, OpStatus::Created);

        let mut stored_version = 1u64;

        for (i, guess) in guesses.into_iter().enumerate() {
            // base_version 0 would be a create; updates start at 1.
            let base_version = guess.max(1);
            let op = MutationRecord::update(
                device,
                entity_id,
                base_version,
                supplier(&format!("attempt-{i}")),
            );
            let response = server
                .handle_push("agent-1", &PushRequest::new(device, vec![op]))
                .unwrap();
            let result = &response.results[0];

            if base_version == stored_version {
                prop_assert_eq!(result.status, OpStatus::Updated);
                prop_assert_eq!(result.version, Some(stored_version + 1));
                stored_version += 1;
            } else if base_version < stored_version {
                prop_assert_eq!(result.status, OpStatus::Conflict);
                prop_assert_eq!(result.version, Some(stored_version));
            } else {
                prop_assert_eq!(result.status, OpStatus::Error);
            }
        }
    }
}
