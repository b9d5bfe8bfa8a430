//! # LedgerSync Server
//!
//! Server-side components of the LedgerSync protocol.
//!
//! This crate provides:
//! - The push handler (per-operation optimistic version checking)
//! - The pull handler (watermark-scoped change feed, tombstones included)
//! - The conflict resolution engine (server-wins / client-wins / merge)
//! - The device/session registry
//! - The append-only audit log
//! - Collaborator traits for persistence and authorization
//!
//! # Architecture
//!
//! The server is transport-agnostic: an HTTP (or other) layer is expected
//! to decode requests and call [`SyncServer::handle_push`] and
//! [`SyncServer::handle_pull`]. Persistence and authorization are injected
//! collaborators ([`EntityStore`], [`Authorizer`]); in-memory reference
//! implementations back the tests.
//!
//! # Protocol
//!
//! Each pushed operation is applied independently — partial success is the
//! normal case, and one bad record never blocks the rest of its batch. The
//! version column is the optimistic-concurrency guard: a device can never
//! silently overwrite a change it has not seen.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod audit;
mod authz;
mod config;
mod error;
mod pull;
mod push;
mod registry;
mod resolve;
mod server;
mod store;

pub use audit::{AuditEvent, AuditLog, MemoryAuditLog};
pub use authz::{AllowAll, Authorizer, VisibleSet};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use pull::PullHandler;
pub use push::PushHandler;
pub use registry::{DeviceRegistry, DeviceSession};
pub use resolve::resolve;
pub use server::SyncServer;
pub use store::{EntityStore, MemoryEntityStore};
