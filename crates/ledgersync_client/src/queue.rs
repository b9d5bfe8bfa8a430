//! Sync queue: pending mutations awaiting server acknowledgment.

use crate::error::ClientResult;
use crate::mutation_log::MutationLog;
use ledgersync_protocol::MutationRecord;
use parking_lot::RwLock;

/// Status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// Waiting to be sent.
    Pending,
    /// Claimed by the in-flight push batch.
    InFlight,
    /// Exceeded the retry limit; requires manual intervention.
    Failed,
}

/// A queued mutation with its retry state.
///
/// Owned exclusively by the device; the server only ever sees the inner
/// [`MutationRecord`].
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Entry id, assigned by the mutation log.
    pub id: u64,
    /// The captured mutation.
    pub record: MutationRecord,
    /// Current status.
    pub status: QueueStatus,
    /// Number of failed attempts so far.
    pub retry_count: u32,
    /// Error from the last failed attempt.
    pub last_error: Option<String>,
}

/// Durable, per-device queue of mutations awaiting transmission.
///
/// Entries leave the queue only on explicit server acknowledgment — a
/// per-operation result in a push response — never optimistically.
/// Entries that exhaust their retries stay visible via [`SyncQueue::failed`]
/// rather than being dropped: losing a financial record is never
/// acceptable.
pub struct SyncQueue {
    log: MutationLog,
    entries: RwLock<Vec<QueueEntry>>,
    max_retries: u32,
}

impl SyncQueue {
    /// Creates a queue over a mutation log, replaying unacknowledged
    /// entries as pending.
    pub fn new(log: MutationLog, max_retries: u32) -> ClientResult<Self> {
        let entries = log
            .replay()?
            .into_iter()
            .map(|(id, record)| QueueEntry {
                id,
                record,
                status: QueueStatus::Pending,
                retry_count: 0,
                last_error: None,
            })
            .collect();

        Ok(Self {
            log,
            entries: RwLock::new(entries),
            max_retries,
        })
    }

    /// Durably captures a mutation and queues it.
    pub fn record(&self, record: MutationRecord) -> ClientResult<u64> {
        let id = self.log.record(record.clone())?;
        self.entries.write().push(QueueEntry {
            id,
            record,
            status: QueueStatus::Pending,
            retry_count: 0,
            last_error: None,
        });
        Ok(id)
    }

    /// Returns up to `max` pending entries in insertion order, skipping
    /// entries already claimed by the in-flight batch.
    pub fn next_batch(&self, max: usize) -> Vec<QueueEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.status == QueueStatus::Pending)
            .take(max)
            .cloned()
            .collect()
    }

    /// Marks entries as claimed by the in-flight batch.
    pub fn mark_sent(&self, ids: &[u64]) {
        let mut entries = self.entries.write();
        for entry in entries.iter_mut() {
            if ids.contains(&entry.id) && entry.status == QueueStatus::Pending {
                entry.status = QueueStatus::InFlight;
            }
        }
    }

    /// Returns in-flight entries to pending after a transport failure.
    /// The whole batch is retried later; nothing is dropped.
    pub fn release(&self, ids: &[u64]) {
        let mut entries = self.entries.write();
        for entry in entries.iter_mut() {
            if ids.contains(&entry.id) && entry.status == QueueStatus::InFlight {
                entry.status = QueueStatus::Pending;
            }
        }
    }

    /// Records a per-operation failure. The entry returns to pending
    /// until it exceeds the retry limit, after which it stays failed and
    /// must be surfaced for manual intervention.
    pub fn mark_failed(&self, id: u64, error: impl Into<String>) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.retry_count += 1;
            entry.last_error = Some(error.into());
            entry.status = if entry.retry_count >= self.max_retries {
                QueueStatus::Failed
            } else {
                QueueStatus::Pending
            };
        }
    }

    /// Removes an entry after explicit server acknowledgment, durably
    /// recording the ack so a restart does not resend it.
    pub fn mark_synced(&self, id: u64) -> ClientResult<()> {
        self.log.ack(id)?;
        self.entries.write().retain(|e| e.id != id);
        Ok(())
    }

    /// Returns entries that exhausted their retries.
    pub fn failed(&self) -> Vec<QueueEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.status == QueueStatus::Failed)
            .cloned()
            .collect()
    }

    /// Re-queues failed entries after manual intervention.
    pub fn retry_failed(&self) {
        let mut entries = self.entries.write();
        for entry in entries.iter_mut() {
            if entry.status == QueueStatus::Failed {
                entry.status = QueueStatus::Pending;
                entry.retry_count = 0;
                entry.last_error = None;
            }
        }
    }

    /// Number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|e| e.status == QueueStatus::Pending)
            .count()
    }

    /// Total number of entries still in the queue.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
