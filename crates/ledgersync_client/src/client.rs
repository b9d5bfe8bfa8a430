//! The transport client: owns the push/pull cycle and retry/backoff.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::queue::SyncQueue;
use crate::store::LocalStore;
use crate::transport::Transport;
use ledgersync_protocol::{
    ConflictRecord, MutationRecord, OpStatus, PullRequest, PushRequest,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statistics about sync activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed push batches.
    pub pushes: u64,
    /// Completed pulls.
    pub pulls: u64,
    /// Operations acknowledged by the server.
    pub operations_pushed: u64,
    /// Entities applied from pulls.
    pub operations_pulled: u64,
    /// Conflicts reported by the server.
    pub conflicts_seen: u64,
    /// Sync cycle retries after transport failures.
    pub retries: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Outcome of one push batch.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    /// Operations sent in the batch.
    pub sent: usize,
    /// Operations the server acknowledged (created/updated/exists).
    pub acked: usize,
    /// Conflicts the server reported. Also retained on the client via
    /// [`SyncClient::conflicts`].
    pub conflicts: Vec<ConflictRecord>,
    /// Operations rejected with a per-op error.
    pub errors: usize,
}

/// Result of a full sync cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// Entities applied from the pull phase.
    pub pulled: u64,
    /// Operations acknowledged in the push phase.
    pub pushed: u64,
    /// Conflicts reported in the push phase.
    pub conflicts: Vec<ConflictRecord>,
    /// Duration of the cycle.
    pub duration: Duration,
}

/// Resets an in-flight flag when the operation finishes, even on error.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The device's sync client.
///
/// Owns the request/response cycle for push and pull, the retry/backoff
/// policy, and the dispatch of per-operation results back to the queue.
///
/// Concurrency contract: at most one outstanding push and one outstanding
/// pull at a time, independently — a push failure never blocks a pull.
pub struct SyncClient<T: Transport> {
    config: ClientConfig,
    transport: T,
    queue: SyncQueue,
    store: LocalStore,
    conflicts: RwLock<Vec<ConflictRecord>>,
    stats: RwLock<SyncStats>,
    push_in_flight: AtomicBool,
    pull_in_flight: AtomicBool,
}

impl<T: Transport> SyncClient<T> {
    /// Creates a sync client over a transport and a recovered queue.
    pub fn new(config: ClientConfig, transport: T, queue: SyncQueue) -> Self {
        Self {
            config,
            transport,
            queue,
            store: LocalStore::new(),
            conflicts: RwLock::new(Vec::new()),
            stats: RwLock::new(SyncStats::default()),
            push_in_flight: AtomicBool::new(false),
            pull_in_flight: AtomicBool::new(false),
        }
    }

    /// Captures a local mutation: durably logged and queued first, then
    /// staged into the local store. If the durable capture fails, the
    /// local store is untouched and the error is surfaced.
    pub fn record_mutation(&self, record: MutationRecord) -> ClientResult<u64> {
        record.validate()?;
        let id = self.queue.record(record.clone())?;
        self.store.stage_local(&record)?;
        Ok(id)
    }

    /// Sends one bounded batch of pending mutations and dispatches the
    /// per-operation results back to the queue.
    ///
    /// On transport failure the whole batch returns to pending — nothing
    /// is dropped, and the error is retryable with backoff.
    pub fn push_pending(&self) -> ClientResult<PushOutcome> {
        let _guard =
            FlightGuard::acquire(&self.push_in_flight).ok_or(ClientError::PushInFlight)?;

        let batch = self.queue.next_batch(self.config.push_batch_size);
        if batch.is_empty() {
            return Ok(PushOutcome::default());
        }

        let ids: Vec<u64> = batch.iter().map(|e| e.id).collect();
        self.queue.mark_sent(&ids);

        let request = PushRequest::new(
            self.config.device_id,
            batch.iter().map(|e| e.record.clone()).collect(),
        );

        let response = match self.transport.push(&request) {
            Ok(response) => response,
            Err(err) => {
                self.queue.release(&ids);
                self.stats.write().last_error = Some(err.to_string());
                warn!(error = %err, "push failed, batch returned to pending");
                return Err(err);
            }
        };

        if response.results.len() != batch.len() {
            self.queue.release(&ids);
            return Err(ClientError::Protocol(format!(
                "expected {} results, got {}",
                batch.len(),
                response.results.len()
            )));
        }

        let mut outcome = PushOutcome {
            sent: batch.len(),
            ..Default::default()
        };

        for (entry, result) in batch.iter().zip(response.results.iter()) {
            if result.status.is_ack() {
                self.queue.mark_synced(entry.id)?;
                outcome.acked += 1;
            } else if result.status == OpStatus::Conflict {
                // A conflict is a definitive per-op answer: the entry
                // leaves the queue, the conflict stays for resolution.
                self.queue.mark_synced(entry.id)?;
                let conflict = ConflictRecord {
                    entity_type: entry.record.entity_type,
                    entity_id: entry.record.entity_id,
                    server_version: result.version.unwrap_or(0),
                    client_version: entry.record.base_version,
                    server_payload: result.server_payload.clone(),
                    client_payload: entry.record.payload.clone(),
                };
                warn!(entity = %conflict.entity_id, "push conflict recorded");
                self.conflicts.write().push(conflict.clone());
                outcome.conflicts.push(conflict);
            } else {
                self.queue.mark_failed(
                    entry.id,
                    result.message.clone().unwrap_or_else(|| "rejected".into()),
                );
                outcome.errors += 1;
            }
        }

        {
            let mut stats = self.stats.write();
            stats.pushes += 1;
            stats.operations_pushed += outcome.acked as u64;
            stats.conflicts_seen += outcome.conflicts.len() as u64;
            stats.last_error = None;
        }

        debug!(
            sent = outcome.sent,
            acked = outcome.acked,
            conflicts = outcome.conflicts.len(),
            errors = outcome.errors,
            "push batch dispatched"
        );
        Ok(outcome)
    }

    /// Pulls all remote changes since the device watermark, applying them
    /// with last-write-wins by version. The watermark advances only after
    /// each entire batch applied without error, so a failure cannot skip
    /// entities. Returns the number of entities pulled.
    pub fn pull_once(&self) -> ClientResult<u64> {
        let _guard =
            FlightGuard::acquire(&self.pull_in_flight).ok_or(ClientError::PullInFlight)?;

        let mut total = 0u64;
        loop {
            let request = PullRequest::new(self.config.device_id, self.store.watermark());
            let response = self.transport.pull(&request).map_err(|err| {
                self.stats.write().last_error = Some(err.to_string());
                err
            })?;

            total += response.entities.len() as u64;
            self.store.apply_remote(&response.entities);
            self.store.set_watermark(response.new_watermark);

            if !response.has_more {
                break;
            }
        }

        {
            let mut stats = self.stats.write();
            stats.pulls += 1;
            stats.operations_pulled += total;
        }

        debug!(pulled = total, watermark = self.store.watermark(), "pull applied");
        Ok(total)
    }

    /// Runs a full pull-then-push cycle.
    pub fn sync(&self) -> ClientResult<SyncCycleResult> {
        let start = Instant::now();

        let pulled = self.pull_once()?;
        let outcome = self.push_pending()?;

        info!(
            pulled,
            pushed = outcome.acked,
            conflicts = outcome.conflicts.len(),
            "sync cycle complete"
        );

        Ok(SyncCycleResult {
            pulled,
            pushed: outcome.acked as u64,
            conflicts: outcome.conflicts,
            duration: start.elapsed(),
        })
    }

    /// Runs [`SyncClient::sync`] with exponential backoff on retryable
    /// errors.
    pub fn sync_with_retry(&self) -> ClientResult<SyncCycleResult> {
        let retry = self.config.retry.clone();
        let mut last_error = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "sync backoff");
                std::thread::sleep(delay);
                self.stats.write().retries += 1;
            }

            match self.sync() {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt + 1 < retry.max_attempts => {
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::Protocol("no sync attempts made".into())))
    }

    /// Conflicts reported by the server, awaiting resolution.
    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.conflicts.read().clone()
    }

    /// Drains the recorded conflicts (after handing them to a resolver).
    pub fn take_conflicts(&self) -> Vec<ConflictRecord> {
        std::mem::take(&mut *self.conflicts.write())
    }

    /// Current statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The sync queue (per-record status, failed entries).
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// The local entity store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::mutation_log::MutationLog;
    use crate::transport::MockTransport;
    use ledgersync_protocol::{
        EntityPayload, EntityRecord, EntityType, PullResponse, PushResponse, PushResult,
        SupplierPayload,
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

    fn client() -> SyncClient<MockTransport> {
        let config = ClientConfig::new(Uuid::new_v4(), "agent-1", "https://sync.example.com")
            .with_max_entry_retries(3);
        let queue = SyncQueue::new(MutationLog::in_memory().unwrap(), 3).unwrap();
        SyncClient::new(config, MockTransport::new(), queue)
    }

    #[test]
    fn record_mutation_stages_locally() {
        let client = client();
        let entity_id = Uuid::new_v4();

        client
            .record_mutation(MutationRecord::create(
                client.config().device_id,
                entity_id,
                supplier("Asha"),
            ))
            .unwrap();

        assert_eq!(client.queue().pending_count(), 1);
        assert!(client.store().get(EntityType::Supplier, entity_id).is_some());
    }

    #[test]
    fn push_dispatches_per_op_results() {
        let client = client();
        let device = client.config().device_id;
        let created = Uuid::new_v4();
        let rejected = Uuid::new_v4();

        client
            .record_mutation(MutationRecord::create(device, created, supplier("ok")))
            .unwrap();
        client
            .record_mutation(MutationRecord::create(device, rejected, supplier("bad")))
            .unwrap();

        client.transport.enqueue_push(PushResponse::new(vec![
            PushResult::created(created, 1),
            PushResult::error(rejected, "not authorized"),
        ]));

        let outcome = client.push_pending().unwrap();
        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.acked, 1);
        assert_eq!(outcome.errors, 1);

        // The acked entry left the queue; the rejected one is pending
        // again with its retry recorded.
        assert_eq!(client.queue().len(), 1);
        let retry = &client.queue().next_batch(10)[0];
        assert_eq!(retry.retry_count, 1);
        assert_eq!(retry.last_error.as_deref(), Some("not authorized"));
    }

    #[test]
    fn push_conflict_is_recorded_and_entry_acknowledged() {
        let client = client();
        let device = client.config().device_id;
        let entity_id = Uuid::new_v4();

        client
            .record_mutation(MutationRecord::create(device, entity_id, supplier("mine")))
            .unwrap();

        client.transport.enqueue_push(PushResponse::new(vec![
            PushResult::conflict(entity_id, 4, supplier("server")),
        ]));

        let outcome = client.push_pending().unwrap();
        assert_eq!(outcome.conflicts.len(), 1);

        // Entry is gone from the queue; the conflict is retained.
        assert!(client.queue().is_empty());
        let conflicts = client.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].server_version, 4);
        assert_eq!(conflicts[0].client_payload, Some(supplier("mine")));
    }

    #[test]
    fn transport_failure_returns_batch_to_pending() {
        let client = client();
        let device = client.config().device_id;
        client
            .record_mutation(MutationRecord::create(device, Uuid::new_v4(), supplier("a")))
            .unwrap();

        client.transport.enqueue_push_error("no connectivity");

        let result = client.push_pending();
        assert!(matches!(
            result,
            Err(ClientError::Transport { retryable: true, .. })
        ));
        assert_eq!(client.queue().pending_count(), 1);
        assert_eq!(client.queue().next_batch(10)[0].retry_count, 0);
    }

    #[test]
    fn result_count_mismatch_is_protocol_error() {
        let client = client();
        let device = client.config().device_id;
        client
            .record_mutation(MutationRecord::create(device, Uuid::new_v4(), supplier("a")))
            .unwrap();

        client.transport.enqueue_push(PushResponse::new(vec![]));

        let result = client.push_pending();
        assert!(matches!(result, Err(ClientError::Protocol(_))));
        assert_eq!(client.queue().pending_count(), 1);
    }

    #[test]
    fn empty_queue_pushes_nothing() {
        let client = client();
        let outcome = client.push_pending().unwrap();
        assert_eq!(outcome.sent, 0);
    }

    #[test]
    fn pull_applies_batches_and_advances_watermark() {
        let client = client();
        let id = Uuid::new_v4();

        let mut first = EntityRecord::created(id, supplier("v1"), 1000);
        first.sequence = 1;
        let mut second = EntityRecord::created(Uuid::new_v4(), supplier("v2"), 1000);
        second.sequence = 2;

        client
            .transport
            .enqueue_pull(PullResponse::new(vec![first], 1, true));
        client
            .transport
            .enqueue_pull(PullResponse::new(vec![second], 2, false));

        let pulled = client.pull_once().unwrap();
        assert_eq!(pulled, 2);
        assert_eq!(client.store().watermark(), 2);
        assert_eq!(client.store().len(), 2);
    }

    #[test]
    fn pull_failure_leaves_watermark_untouched() {
        let client = client();
        client.transport.enqueue_pull_error("offline");

        let result = client.pull_once();
        assert!(result.is_err());
        assert_eq!(client.store().watermark(), 0);
    }

    #[test]
    fn push_failure_does_not_block_pull() {
        let client = client();
        let device = client.config().device_id;
        client
            .record_mutation(MutationRecord::create(device, Uuid::new_v4(), supplier("a")))
            .unwrap();

        client.transport.enqueue_push_error("offline");
        assert!(client.push_pending().is_err());

        client
            .transport
            .enqueue_pull(PullResponse::new(vec![], 0, false));
        assert!(client.pull_once().is_ok());
    }

    #[test]
    fn sync_cycle_pulls_then_pushes() {
        let client = client();
        let device = client.config().device_id;
        let entity_id = Uuid::new_v4();

        client
            .record_mutation(MutationRecord::create(device, entity_id, supplier("a")))
            .unwrap();

        client
            .transport
            .enqueue_pull(PullResponse::new(vec![], 3, false));
        client
            .transport
            .enqueue_push(PushResponse::new(vec![PushResult::created(entity_id, 1)]));

        let result = client.sync().unwrap();
        assert_eq!(result.pulled, 0);
        assert_eq!(result.pushed, 1);
        assert!(result.conflicts.is_empty());

        let stats = client.stats();
        assert_eq!(stats.pushes, 1);
        assert_eq!(stats.pulls, 1);
        assert_eq!(stats.operations_pushed, 1);
    }

    #[test]
    fn sync_with_retry_recovers_from_transient_failure() {
        let config = ClientConfig::new(Uuid::new_v4(), "agent-1", "https://sync.example.com")
            .with_retry(
                RetryConfig::new(3).with_initial_delay(Duration::from_millis(1)),
            );
        let queue = SyncQueue::new(MutationLog::in_memory().unwrap(), 3).unwrap();
        let client = SyncClient::new(config, MockTransport::new(), queue);

        client.transport.enqueue_pull_error("offline");
        client
            .transport
            .enqueue_pull(PullResponse::new(vec![], 0, false));

        let result = client.sync_with_retry().unwrap();
        assert_eq!(result.pulled, 0);
        assert_eq!(client.stats().retries, 1);
    }

    #[test]
    fn sync_with_retry_gives_up_after_max_attempts() {
        let config = ClientConfig::new(Uuid::new_v4(), "agent-1", "https://sync.example.com")
            .with_retry(
                RetryConfig::new(2).with_initial_delay(Duration::from_millis(1)),
            );
        let queue = SyncQueue::new(MutationLog::in_memory().unwrap(), 3).unwrap();
        let client = SyncClient::new(config, MockTransport::new(), queue);

        client.transport.enqueue_pull_error("offline");
        client.transport.enqueue_pull_error("still offline");

        let result = client.sync_with_retry();
        assert!(matches!(result, Err(ClientError::Transport { .. })));
        assert_eq!(client.stats().retries, 1);
    }
}
