//! Server facade wiring the handlers, registry, audit log and store.

use crate::audit::{AuditEvent, AuditLog, MemoryAuditLog};
use crate::authz::{AllowAll, Authorizer};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::pull::PullHandler;
use crate::push::PushHandler;
use crate::registry::{DeviceRegistry, DeviceSession};
use crate::resolve::resolve;
use crate::store::{EntityStore, MemoryEntityStore};
use ledgersync_protocol::{
    ConflictRecord, EntityRecord, Operation, PullRequest, PullResponse, PushRequest, PushResponse,
    ResolutionStrategy,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The sync server.
///
/// Transport-agnostic: an HTTP layer is expected to decode requests and
/// call [`SyncServer::handle_push`] / [`SyncServer::handle_pull`] with the
/// authenticated user.
///
/// # Example
///
/// ```
/// use ledgersync_server::{ServerConfig, SyncServer};
/// use uuid::Uuid;
///
/// let server = SyncServer::new(ServerConfig::default());
/// let device = Uuid::new_v4();
/// server.register_device(device, "agent-1").unwrap();
/// ```
pub struct SyncServer {
    store: Arc<dyn EntityStore>,
    registry: Arc<DeviceRegistry>,
    audit: Arc<dyn AuditLog>,
    push: PushHandler,
    pull: PullHandler,
}

impl SyncServer {
    /// Creates a server backed by in-memory collaborators.
    pub fn new(config: ServerConfig) -> Self {
        let audit_history = config.audit_history;
        Self::with_parts(
            config,
            Arc::new(MemoryEntityStore::new()),
            Arc::new(MemoryAuditLog::new(audit_history)),
            Arc::new(AllowAll),
        )
    }

    /// Creates a server over injected collaborators.
    pub fn with_parts(
        config: ServerConfig,
        store: Arc<dyn EntityStore>,
        audit: Arc<dyn AuditLog>,
        authz: Arc<dyn Authorizer>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let push = PushHandler::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            Arc::clone(&authz),
            config.max_push_batch,
        );
        let pull = PullHandler::new(
            Arc::clone(&store),
            Arc::clone(&authz),
            Arc::clone(&registry),
            config.max_pull_batch,
        );

        Self {
            store,
            registry,
            audit,
            push,
            pull,
        }
    }

    /// Registers a device for a user.
    pub fn register_device(&self, device_id: Uuid, user_id: &str) -> ServerResult<()> {
        self.registry.register(device_id, user_id)?;
        info!(device = %device_id, user = user_id, "device registered");
        Ok(())
    }

    /// Handles a push batch from a registered device.
    pub fn handle_push(&self, user: &str, request: &PushRequest) -> ServerResult<PushResponse> {
        self.require_device(user, request.device_id)?;
        self.push.handle(user, request)
    }

    /// Handles a pull from a registered device.
    pub fn handle_pull(&self, user: &str, request: &PullRequest) -> ServerResult<PullResponse> {
        self.require_device(user, request.device_id)?;
        self.pull.handle(user, request)
    }

    /// Resolves a reported conflict and persists the outcome.
    ///
    /// `ServerWins` with no state change persists nothing (idempotent).
    /// Fails with [`ServerError::ResolutionRaced`] if the entity was
    /// mutated since the conflict was detected and re-resolution is
    /// needed against fresh state.
    pub fn resolve_conflict(
        &self,
        user: &str,
        conflict: &ConflictRecord,
        strategy: &ResolutionStrategy,
    ) -> ServerResult<EntityRecord> {
        let server = self
            .store
            .get(conflict.entity_type, conflict.entity_id)
            .ok_or(ServerError::NotFound {
                entity_type: conflict.entity_type,
                entity_id: conflict.entity_id,
            })?;

        if server.version != conflict.server_version {
            return Err(ServerError::ResolutionRaced {
                entity_id: conflict.entity_id,
            });
        }

        let resolved = resolve(&server, conflict, strategy);
        if resolved.version == server.version {
            return Ok(server);
        }

        let applied = self
            .store
            .update_with_version_check(resolved, server.version)?
            .ok_or(ServerError::ResolutionRaced {
                entity_id: conflict.entity_id,
            })?;

        let operation = if applied.is_deleted() && !server.is_deleted() {
            Operation::Delete
        } else {
            Operation::Update
        };
        self.audit.append(AuditEvent::accepted(
            Uuid::nil(),
            user,
            conflict.entity_type,
            conflict.entity_id,
            operation,
            Some(server.payload.clone()),
            Some(applied.payload.clone()),
        ));

        info!(
            entity = %conflict.entity_id,
            version = applied.version,
            "conflict resolved"
        );
        Ok(applied)
    }

    /// Returns the session for a device.
    pub fn session(&self, device_id: Uuid) -> Option<DeviceSession> {
        self.registry.session(device_id)
    }

    /// Returns the last assigned commit sequence.
    pub fn current_sequence(&self) -> u64 {
        self.store.current_sequence()
    }

    /// Returns the entity store collaborator.
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Returns the audit log collaborator.
    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    fn require_device(&self, user: &str, device_id: Uuid) -> ServerResult<()> {
        let session = self
            .registry
            .session(device_id)
            .ok_or(ServerError::UnknownDevice(device_id))?;
        if session.user_id != user {
            return Err(ServerError::NotAuthorized(format!(
                "device {device_id} is registered to another user"
            )));
        }
        Ok(())
    }
}
