//! Request correlation between calling tasks and the read loop.
//!
//! Every request carries a connection-unique request id. The caller
//! registers a one-shot channel under that id before writing the frame;
//! the read loop completes it when a response with a matching id
//! arrives. Responses therefore pair correctly regardless of broker
//! reordering.

use bytes::Bytes;
use parking_lot::Mutex;
use petrel_protocol::CommandHeader;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

/// Lifecycle of a connection as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Closing,
    Closed,
}

/// Pending-request table plus request id allocator.
pub struct Dispatcher {
    state: Mutex<ConnectionState>,
    pending: Mutex<HashMap<u64, oneshot::Sender<(CommandHeader, Bytes)>>>,
    next_request_id: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Connecting),
            pending: Mutex::new(HashMap::new()),
            // id 0 is reserved for "no request id"
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Allocates the next request id. Ids are never reused within a
    /// connection.
    pub fn next_request_id(&self) -> Result<u64, crate::error::ClientError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if id == u64::MAX {
            return Err(crate::error::ClientError::RequestIdExhausted);
        }
        Ok(id)
    }

    /// Registers a pending request and returns the receiving half.
    pub fn register(&self, request_id: u64) -> oneshot::Receiver<(CommandHeader, Bytes)> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);
        rx
    }

    /// Completes a pending request. Returns false when no request with
    /// that id is outstanding (already timed out, or unsolicited).
    pub fn complete(&self, request_id: u64, header: CommandHeader, payload: Bytes) -> bool {
        let sender = self.pending.lock().remove(&request_id);
        match sender {
            Some(tx) => tx.send((header, payload)).is_ok(),
            None => false,
        }
    }

    /// Removes a pending request without completing it. Used when a
    /// caller gives up waiting.
    pub fn cancel(&self, request_id: u64) -> bool {
        self.pending.lock().remove(&request_id).is_some()
    }

    /// Drops every pending sender. Each waiting caller observes the
    /// closed channel exactly once. Idempotent.
    pub fn fail_all(&self) {
        self.pending.lock().clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn mark_connected(&self) {
        *self.state.lock() = ConnectionState::Connected;
    }

    pub fn mark_closing(&self) {
        *self.state.lock() = ConnectionState::Closing;
    }

    pub fn mark_closed(&self) {
        *self.state.lock() = ConnectionState::Closed;
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
