//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so different
//! libraries (or non-HTTP transports) can be plugged in. Request and
//! response bodies are JSON.

use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;
use ledgersync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. The sync
/// client only needs POST with a body.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based sync transport with JSON bodies.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the sync server (e.g. "https://sync.example.com").
    base_url: String,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post_json<Req, Res>(&self, endpoint: &str, request: &Req) -> ClientResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(ClientError::transport_retryable("not connected"));
        }

        let body = serde_json::to_vec(request)?;
        let url = format!("{}{}", self.base_url, endpoint);

        let response_body = self.client.post(&url, body).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            self.connected.store(false, Ordering::SeqCst);
            ClientError::transport_retryable(e)
        })?;

        *self.last_error.write() = None;
        serde_json::from_slice(&response_body)
            .map_err(|e| ClientError::Protocol(format!("failed to decode response: {e}")))
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn push(&self, request: &PushRequest) -> ClientResult<PushResponse> {
        self.post_json("/sync/push", request)
    }

    fn pull(&self, request: &PullRequest) -> ClientResult<PullResponse> {
        self.post_json("/sync/pull", request)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Trait for in-process servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a POST request and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

/// A loopback HTTP client routing requests directly to an in-process
/// server. Useful for testing without network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a loopback client over the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
        let path = url.find("/sync/").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
