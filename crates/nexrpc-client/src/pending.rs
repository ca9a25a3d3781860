use nexrpc_common::{RequestId, Response, Result, RpcError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;

/// Identifies one physical connection owned by the connection manager.
pub type ConnectionId = u64;

/// Receiving half of a pending call.
pub type CompletionHandle = oneshot::Receiver<Result<Response>>;

struct PendingCall {
    sender: oneshot::Sender<Result<Response>>,
    created_at: Instant,
    connection_id: ConnectionId,
}

/// Table of in-flight calls, keyed by request id.
///
/// Callers register before writing their request and then wait on the
/// returned handle. Connection read loops complete entries as responses
/// arrive, in whatever order the server produces them.
#[derive(Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<RequestId, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call sent over `connection_id`.
    ///
    /// # Errors
    ///
    /// Fails if a call with the same request id is already in flight.
    pub fn register(&self, request_id: RequestId, connection_id: ConnectionId) -> Result<CompletionHandle> {
        let mut calls = self.calls.lock();
        if calls.contains_key(&request_id) {
            return Err(RpcError::InvalidRequest(format!(
                "Request id {} is already in flight",
                request_id
            )));
        }

        let (sender, receiver) = oneshot::channel();
        calls.insert(
            request_id,
            PendingCall {
                sender,
                created_at: Instant::now(),
                connection_id,
            },
        );
        Ok(receiver)
    }

    /// Delivers a response to the call registered under `request_id`.
    ///
    /// Returns `false` if no such call exists (it already timed out or was
    /// never registered); the response is dropped.
    pub fn complete(&self, request_id: &str, response: Response) -> bool {
        let Some(call) = self.calls.lock().remove(request_id) else {
            debug!(request_id, "Dropping response for unknown request");
            return false;
        };

        debug!(
            request_id,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            "Completing call"
        );
        // the waiter may have given up in the meantime
        let _ = call.sender.send(Ok(response));
        true
    }

    /// Fails the call registered under `request_id`.
    pub fn fail(&self, request_id: &str, error: RpcError) -> bool {
        match self.calls.lock().remove(request_id) {
            Some(call) => {
                let _ = call.sender.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Forgets a call without notifying its waiter.
    pub fn remove(&self, request_id: &str) -> bool {
        self.calls.lock().remove(request_id).is_some()
    }

    /// Fails every call registered against `connection_id`, returning how
    /// many were failed.
    pub fn fail_connection<F>(&self, connection_id: ConnectionId, make_error: F) -> usize
    where
        F: Fn() -> RpcError,
    {
        let failed: Vec<PendingCall> = {
            let mut calls = self.calls.lock();
            let ids: Vec<RequestId> = calls
                .iter()
                .filter(|(_, call)| call.connection_id == connection_id)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| calls.remove(id)).collect()
        };

        let count = failed.len();
        for call in failed {
            let _ = call.sender.send(Err(make_error()));
        }
        count
    }

    /// Returns a guard that forgets `request_id` when dropped.
    ///
    /// Callers hold it while waiting so a call abandoned at any await point
    /// (timeout, `select!`, task abort) leaves no entry behind.
    pub fn guard(&self, request_id: RequestId) -> PendingGuard<'_> {
        PendingGuard {
            pending: self,
            request_id,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

/// Removes its call from the table on drop. See [`PendingCalls::guard`].
pub struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // no-op once the call was completed or failed
        if self.pending.remove(&self.request_id) {
            debug!(request_id = %self.request_id, "Removed abandoned call");
        }
    }
}
