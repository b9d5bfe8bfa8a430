//! Authorization collaborator.
//!
//! Authentication and authorization live outside this crate; the handlers
//! only consume this narrow interface to scope what a user may see and
//! push.

use ledgersync_protocol::{EntityType, MutationRecord};
use std::collections::HashSet;
use uuid::Uuid;

/// The set of entity ids a user may see for one entity type.
#[derive(Debug, Clone)]
pub enum VisibleSet {
    /// Everything is visible.
    All,
    /// Only the listed ids are visible.
    Ids(HashSet<Uuid>),
}

impl VisibleSet {
    /// Returns true if the given entity id is in the set.
    pub fn contains(&self, entity_id: Uuid) -> bool {
        match self {
            VisibleSet::All => true,
            VisibleSet::Ids(ids) => ids.contains(&entity_id),
        }
    }
}

/// Scoping interface consumed by the pull handler and, per operation, by
/// the push handler.
pub trait Authorizer: Send + Sync {
    /// Entities of the given type visible to the user.
    fn visible_entities(&self, user: &str, entity_type: EntityType) -> VisibleSet;

    /// Whether the user may push this mutation. A rejection becomes a
    /// per-operation `error` result, not a batch failure.
    fn may_push(&self, user: &str, record: &MutationRecord) -> bool;
}

/// Reference implementation that authorizes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn visible_entities(&self, _user: &str, _entity_type: EntityType) -> VisibleSet {
        VisibleSet::All
    }

    fn may_push(&self, _user: &str, _record: &MutationRecord) -> bool {
        true
    }
}
