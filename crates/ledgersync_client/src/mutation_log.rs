//! Durable mutation log.
//!
//! Every captured mutation is appended here before the local write is
//! considered complete. The log is append-only JSON lines: mutation lines
//! record captures, ack lines record server acknowledgments. Replaying
//! the log after a crash reconstructs exactly the entries the server has
//! not acknowledged.

use crate::error::ClientResult;
use ledgersync_protocol::MutationRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// One line of the log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "line", rename_all = "snake_case")]
enum LogLine {
    /// A captured mutation.
    Mutation {
        /// Entry id.
        id: u64,
        /// The captured record.
        record: MutationRecord,
    },
    /// A server acknowledgment for an earlier mutation line.
    Ack {
        /// Acknowledged entry id.
        id: u64,
    },
}

/// Storage behind the mutation log.
pub trait LogBackend: Send {
    /// Appends bytes to the log.
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Forces appended bytes to durable storage.
    fn flush(&mut self) -> io::Result<()>;
    /// Reads the entire log.
    fn read_all(&mut self) -> io::Result<Vec<u8>>;
}

/// File-backed log storage.
pub struct FileBackend {
    file: File,
    path: PathBuf,
}

impl FileBackend {
    /// Opens (or creates) a log file for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self { file, path })
    }
}

impl LogBackend for FileBackend {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut contents = Vec::new();
        File::open(&self.path)?.read_to_end(&mut contents)?;
        Ok(contents)
    }
}

/// In-memory log storage for tests.
#[derive(Default)]
pub struct MemoryBackend {
    buf: Vec<u8>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogBackend for MemoryBackend {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.buf.clone())
    }
}

/// Append-only durable record of captured mutations and acknowledgments.
pub struct MutationLog {
    backend: Mutex<Box<dyn LogBackend>>,
    sync_on_write: bool,
    next_id: AtomicU64,
}

impl MutationLog {
    /// Creates a log over the given backend, scanning it to restore the
    /// entry id counter.
    pub fn new(backend: Box<dyn LogBackend>, sync_on_write: bool) -> ClientResult<Self> {
        let log = Self {
            backend: Mutex::new(backend),
            sync_on_write,
            next_id: AtomicU64::new(1),
        };
        let max_id = log
            .read_lines()?
            .iter()
            .map(|line| match line {
                LogLine::Mutation { id, .. } | LogLine::Ack { id } => *id,
            })
            .max()
            .unwrap_or(0);
        log.next_id.store(max_id + 1, Ordering::SeqCst);
        Ok(log)
    }

    /// Opens a file-backed log with durable appends.
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        Self::new(Box::new(FileBackend::open(path)?), true)
    }

    /// Creates an in-memory log for tests.
    pub fn in_memory() -> ClientResult<Self> {
        Self::new(Box::new(MemoryBackend::new()), false)
    }

    /// Durably appends a captured mutation and returns its entry id.
    ///
    /// Fails only on storage I/O error; the caller must then treat the
    /// mutation as not captured.
    pub fn record(&self, record: MutationRecord) -> ClientResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.append_line(&LogLine::Mutation { id, record })?;
        Ok(id)
    }

    /// Durably appends an acknowledgment for an entry.
    pub fn ack(&self, id: u64) -> ClientResult<()> {
        self.append_line(&LogLine::Ack { id })
    }

    /// Replays the log: every captured mutation the server has not yet
    /// acknowledged, in capture order.
    pub fn replay(&self) -> ClientResult<Vec<(u64, MutationRecord)>> {
        let lines = self.read_lines()?;
        let acked: std::collections::HashSet<u64> = lines
            .iter()
            .filter_map(|line| match line {
                LogLine::Ack { id } => Some(*id),
                LogLine::Mutation { .. } => None,
            })
            .collect();

        Ok(lines
            .into_iter()
            .filter_map(|line| match line {
                LogLine::Mutation { id, record } if !acked.contains(&id) => Some((id, record)),
                _ => None,
            })
            .collect())
    }

    fn append_line(&self, line: &LogLine) -> ClientResult<()> {
        let mut encoded = serde_json::to_vec(line)?;
        encoded.push(b'\n');

        let mut backend = self.backend.lock();
        backend.append(&encoded)?;
        if self.sync_on_write {
            backend.flush()?;
        }
        Ok(())
    }

    fn read_lines(&self) -> ClientResult<Vec<LogLine>> {
        let contents = self.backend.lock().read_all()?;
        let mut lines = Vec::new();
        for raw in contents.split(|b| *b == b'\n') {
            if raw.is_empty() {
                continue;
            }
            lines.push(serde_json::from_slice(raw)?);
        }
        Ok(lines)
    }
}
