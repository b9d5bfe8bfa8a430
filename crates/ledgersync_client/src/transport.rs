//! Transport layer abstraction for sync requests.

use crate::error::{ClientError, ClientResult};
use ledgersync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// A transport handles network communication with the sync server.
///
/// This trait abstracts the network layer, allowing different
/// implementations (HTTP, loopback for tests, mock).
pub trait Transport: Send + Sync {
    /// Pushes a batch of mutations to the server.
    fn push(&self, request: &PushRequest) -> ClientResult<PushResponse>;

    /// Pulls changes from the server.
    fn pull(&self, request: &PullRequest) -> ClientResult<PullResponse>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> ClientResult<()>;
}

/// A mock transport with scripted responses, for testing.
///
/// Responses are consumed in order; enqueue one per expected call.
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    push_results: Mutex<VecDeque<Result<PushResponse, String>>>,
    pull_results: Mutex<VecDeque<Result<PullResponse, String>>>,
}

impl MockTransport {
    /// Creates a connected mock transport with no scripted responses.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            push_results: Mutex::new(VecDeque::new()),
            pull_results: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues a successful push response.
    pub fn enqueue_push(&self, response: PushResponse) {
        self.push_results.lock().push_back(Ok(response));
    }

    /// Enqueues a push transport failure.
    pub fn enqueue_push_error(&self, message: impl Into<String>) {
        self.push_results.lock().push_back(Err(message.into()));
    }

    /// Enqueues a successful pull response.
    pub fn enqueue_pull(&self, response: PullResponse) {
        self.pull_results.lock().push_back(Ok(response));
    }

    /// Enqueues a pull transport failure.
    pub fn enqueue_pull_error(&self, message: impl Into<String>) {
        self.pull_results.lock().push_back(Err(message.into()));
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    fn push(&self, _request: &PushRequest) -> ClientResult<PushResponse> {
        if !self.is_connected() {
            return Err(ClientError::transport_retryable("not connected"));
        }
        match self.push_results.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ClientError::transport_retryable(message)),
            None => Err(ClientError::Protocol("no scripted push response".into())),
        }
    }

    fn pull(&self, _request: &PullRequest) -> ClientResult<PullResponse> {
        if !self.is_connected() {
            return Err(ClientError::transport_retryable("not connected"));
        }
        match self.pull_results.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ClientError::transport_retryable(message)),
            None => Err(ClientError::Protocol("no scripted pull response".into())),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
