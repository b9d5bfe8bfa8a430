//! # LedgerSync Client
//!
//! Device-side components of the LedgerSync protocol.
//!
//! This crate provides:
//! - A durable mutation log (capture-before-apply, crash-safe)
//! - The sync queue with per-entry retry state
//! - Transport abstraction (HTTP adapter, mock, loopback)
//! - The transport client owning backoff/retry and the push/pull cycle
//! - The local entity store with last-write-wins-by-version apply
//!
//! ## Architecture
//!
//! Every local change is appended to the mutation log *before* the local
//! write is considered complete, so an app crash cannot silently drop a
//! mutation. Queue entries are removed only after the server explicitly
//! acknowledges them in a push response, never optimistically.
//!
//! ## Key Invariants
//!
//! - At most one in-flight push and one in-flight pull at a time
//! - A push failure never blocks a subsequent pull
//! - The pull watermark advances only after an entire batch applied
//! - Entries that exhaust their retries stay visible as failed; financial
//!   records are never silently discarded

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod http;
mod mutation_log;
mod queue;
mod store;
mod transport;

pub use client::{PushOutcome, SyncClient, SyncCycleResult, SyncStats};
pub use config::{ClientConfig, RetryConfig};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer};
pub use mutation_log::{FileBackend, LogBackend, MemoryBackend, MutationLog};
pub use queue::{QueueEntry, QueueStatus, SyncQueue};
pub use store::LocalStore;
pub use transport::{MockTransport, Transport};
