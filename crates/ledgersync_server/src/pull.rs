//! Pull handler: returns entities changed since a device's watermark.

use crate::authz::{Authorizer, VisibleSet};
use crate::error::ServerResult;
use crate::registry::DeviceRegistry;
use crate::store::EntityStore;
use ledgersync_protocol::{EntityType, PullRequest, PullResponse};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Serves watermark-scoped change feeds, tombstones included.
pub struct PullHandler {
    store: Arc<dyn EntityStore>,
    authz: Arc<dyn Authorizer>,
    registry: Arc<DeviceRegistry>,
    max_batch: usize,
}

impl PullHandler {
    /// Creates a pull handler.
    pub fn new(
        store: Arc<dyn EntityStore>,
        authz: Arc<dyn Authorizer>,
        registry: Arc<DeviceRegistry>,
        max_batch: usize,
    ) -> Self {
        Self {
            store,
            authz,
            registry,
            max_batch,
        }
    }

    /// Handles a pull for the given user.
    ///
    /// The commit sequence is snapshotted *before* the scan: an entity
    /// committed while the scan runs may or may not appear in this
    /// response, but its sequence is above the returned watermark either
    /// way, so the next pull re-delivers it. Nothing is ever skipped.
    pub fn handle(&self, user: &str, request: &PullRequest) -> ServerResult<PullResponse> {
        // The device's reported watermark is what it has fully applied;
        // record it before serving so operators can see pull progress.
        self.registry.record_pull(request.device_id, request.watermark)?;

        let snapshot = self.store.current_sequence();

        let mut visible_cache: HashMap<EntityType, VisibleSet> = HashMap::new();
        let mut entities: Vec<_> = self
            .store
            .changed_since(request.watermark, request.entity_types.as_deref())
            .into_iter()
            .filter(|record| {
                visible_cache
                    .entry(record.entity_type)
                    .or_insert_with(|| self.authz.visible_entities(user, record.entity_type))
                    .contains(record.entity_id)
            })
            .collect();

        let has_more = entities.len() > self.max_batch;
        let new_watermark = if has_more {
            entities.truncate(self.max_batch);
            // Truncated: the watermark is the last delivered sequence so
            // the next pull resumes exactly where this one stopped.
            entities.last().map(|r| r.sequence).unwrap_or(snapshot)
        } else {
            snapshot
        };

        debug!(
            device = %request.device_id,
            watermark = request.watermark,
            returned = entities.len(),
            new_watermark,
            has_more,
            "pull served"
        );

        Ok(PullResponse::new(entities, new_watermark, has_more))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{AllowAll, VisibleSet};
    use crate::store::MemoryEntityStore;
    use ledgersync_protocol::{
        EntityPayload, EntityRecord, MutationRecord, SupplierPayload,
    };
    use uuid::Uuid;

    fn supplier(name: &str) -> EntityPayload {
        EntityPayload::Supplier(SupplierPayload {
            name: name.into(),
            phone: None,
            region: None,
            active: true,
        })
    }

    struct Fixture {
        handler: PullHandler,
        store: Arc<MemoryEntityStore>,
        registry: Arc<DeviceRegistry>,
        device: Uuid,
    }

    fn fixture_with(authz: Arc<dyn Authorizer>, max_batch: usize) -> Fixture {
        let store = Arc::new(MemoryEntityStore::new());
        let registry = Arc::new(DeviceRegistry::new());
        let device = Uuid::new_v4();
        registry.register(device, "agent-1").unwrap();

        let handler = PullHandler::new(
            Arc::clone(&store) as Arc<dyn EntityStore>,
            authz,
            Arc::clone(&registry),
            max_batch,
        );
        Fixture {
            handler,
            store,
            registry,
            device,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(AllowAll), 100)
    }

    fn seed(store: &MemoryEntityStore, name: &str) -> EntityRecord {
        store
            .insert(
                EntityRecord::created(Uuid::new_v4(), supplier(name), 1000),
                None,
            )
            .unwrap()
    }

    #[test]
    fn pull_from_zero_returns_everything() {
        let fx = fixture();
        seed(&fx.store, "a");
        seed(&fx.store, "b");

        let response = fx
            .handler
            .handle("agent-1", &PullRequest::new(fx.device, 0))
            .unwrap();

        assert_eq!(response.entities.len(), 2);
        assert_eq!(response.new_watermark, 2);
        assert!(!response.has_more);
    }

    #[test]
    fn pull_includes_tombstones() {
        let fx = fixture();
        let record = seed(&fx.store, "a");
        fx.store
            .update_with_version_check(record.with_tombstone(2000), 1)
            .unwrap()
            .unwrap();

        let response = fx
            .handler
            .handle("agent-1", &PullRequest::new(fx.device, 0))
            .unwrap();

        assert_eq!(response.entities.len(), 1);
        assert!(response.entities[0].is_deleted());
    }

    #[test]
    fn watermark_resumes_after_truncated_batch() {
        let fx = fixture_with(Arc::new(AllowAll), 2);
        for name in ["a", "b", "c", "d", "e"] {
            seed(&fx.store, name);
        }

        let mut watermark = 0;
        let mut seen = Vec::new();
        loop {
            let response = fx
                .handler
                .handle("agent-1", &PullRequest::new(fx.device, watermark))
                .unwrap();
            seen.extend(response.entities.iter().map(|r| r.sequence));
            watermark = response.new_watermark;
            if !response.has_more {
                break;
            }
        }

        // Every committed sequence delivered exactly once, in order.
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(watermark, 5);
    }

    #[test]
    fn watermark_safety_under_interleaved_commit() {
        let fx = fixture();
        seed(&fx.store, "before");

        let response = fx
            .handler
            .handle("agent-1", &PullRequest::new(fx.device, 0))
            .unwrap();
        assert_eq!(response.entities.len(), 1);

        // A commit lands after the pull completed: its sequence is above
        // the returned watermark, so the next pull delivers it.
        seed(&fx.store, "after");

        let next = fx
            .handler
            .handle("agent-1", &PullRequest::new(fx.device, response.new_watermark))
            .unwrap();
        assert_eq!(next.entities.len(), 1);
        assert_eq!(next.entities[0].payload, supplier("after"));
    }

    #[test]
    fn pull_scoped_by_authorizer() {
        struct OnlyOne(Uuid);
        impl Authorizer for OnlyOne {
            fn visible_entities(&self, _user: &str, _entity_type: EntityType) -> VisibleSet {
                VisibleSet::Ids([self.0].into_iter().collect())
            }
            fn may_push(&self, _user: &str, _record: &MutationRecord) -> bool {
                true
            }
        }

        let store = Arc::new(MemoryEntityStore::new());
        let visible = seed(&store, "mine");
        seed(&store, "not-mine");

        let registry = Arc::new(DeviceRegistry::new());
        let device = Uuid::new_v4();
        registry.register(device, "agent-1").unwrap();

        let handler = PullHandler::new(
            Arc::clone(&store) as Arc<dyn EntityStore>,
            Arc::new(OnlyOne(visible.entity_id)),
            registry,
            100,
        );

        let response = handler
            .handle("agent-1", &PullRequest::new(device, 0))
            .unwrap();
        assert_eq!(response.entities.len(), 1);
        assert_eq!(response.entities[0].entity_id, visible.entity_id);
    }

    #[test]
    fn pull_records_device_watermark() {
        let fx = fixture();
        seed(&fx.store, "a");

        fx.handler
            .handle("agent-1", &PullRequest::new(fx.device, 0))
            .unwrap();
        fx.handler
            .handle("agent-1", &PullRequest::new(fx.device, 1))
            .unwrap();

        assert_eq!(fx.registry.session(fx.device).unwrap().last_watermark, 1);
    }

    #[test]
    fn pull_from_unknown_device_rejected() {
        let fx = fixture();
        let result = fx
            .handler
            .handle("agent-1", &PullRequest::new(Uuid::new_v4(), 0));
        assert!(result.is_err());
    }

    #[test]
    fn entity_type_filter() {
        let fx = fixture();
        seed(&fx.store, "a");

        let response = fx
            .handler
            .handle(
                "agent-1",
                &PullRequest::new(fx.device, 0)
                    .with_entity_types(vec![EntityType::Payment]),
            )
            .unwrap();
        assert!(response.entities.is_empty());
    }
}
