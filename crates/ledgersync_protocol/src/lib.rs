//! # LedgerSync Protocol
//!
//! Protocol types and JSON wire format for LedgerSync.
//!
//! This crate provides:
//! - The entity model (`EntityType`, `EntityPayload`, `EntityRecord`)
//! - `MutationRecord` — the unit exchanged between device and server
//! - Push/pull wire messages and per-operation results
//! - `ConflictRecord` and resolution strategies
//!
//! This is a pure protocol crate with no I/O operations. All wire types
//! serialize to JSON via serde.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod entity;
mod error;
mod messages;
mod mutation;
mod time;

pub use conflict::{ConflictRecord, ResolutionStrategy};
pub use entity::{
    CollectionPayload, EntityPayload, EntityRecord, EntityType, PaymentPayload, ProductPayload,
    RateVersionPayload, SupplierPayload,
};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{OpStatus, PullRequest, PullResponse, PushRequest, PushResponse, PushResult};
pub use mutation::{MutationRecord, Operation};
pub use time::unix_millis;
