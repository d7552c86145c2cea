//! In-process routing of replies back to waiting callers.

use qdeck_core::{DeckReply, RequestId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

/// Hands replies pulled off the shared reply subscription to whichever
/// caller registered the matching request id.
///
/// Each request id has at most one waiter and receives at most one
/// reply; later replies for the same id find no waiter and are dropped
/// by the listener.
#[derive(Default)]
pub struct ReplyRouter {
    waiters: Mutex<HashMap<RequestId, oneshot::Sender<DeckReply>>>,
}

impl ReplyRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `request_id` and returns its receiver.
    ///
    /// Registering the same id again replaces the previous waiter,
    /// whose receiver will resolve as closed.
    pub fn register(&self, request_id: RequestId) -> oneshot::Receiver<DeckReply> {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, tx);
        rx
    }

    /// Drops the waiter for `request_id`, if any.
    ///
    /// Callers do this after a timeout so a late reply is not sent into
    /// a channel nobody reads.
    pub fn forget(&self, request_id: RequestId) {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id);
    }

    /// Delivers a reply to its waiter.
    ///
    /// Returns `true` if a waiter was found and still listening.
    pub fn route(&self, reply: DeckReply) -> bool {
        let sender = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&reply.request_id());
        match sender {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Number of callers currently waiting.
    pub fn pending(&self) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
