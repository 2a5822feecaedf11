//! # Reply Module
//!
//! ## Key Concepts
//! - ResponsePromise: writing half that travels with a synchronous send;
//!   clones share one slot and the first reply wins
//! - ResponseHandle: reading half kept by the caller, awaited with a timeout
//! - Response: the reply payload plus the actor that produced it
//!
//! A reply written after the caller stopped waiting is discarded.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use uuid::Uuid;

use crate::address::Address;
use crate::errors::RequestError;
use crate::message::{MessageId, Payload};

/// A reply to a synchronous send, tagged with the actor that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    pub sender: Address,
    pub payload: Payload,
}

impl Response {
    pub fn new(sender: Address, payload: Payload) -> Self {
        Self { sender, payload }
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.payload.get::<T>()
    }

    /// Copies the reply out as `T`.
    pub fn value<T: Any + Clone>(&self) -> Result<T, RequestError> {
        self.payload
            .get::<T>()
            .cloned()
            .ok_or(RequestError::UnexpectedReply {
                expected: type_name::<T>(),
                actual: self.payload.type_name(),
            })
    }
}

/// Writing half of a one-shot response channel.
///
/// Clones share the same slot: the first `deliver` wins and every later
/// attempt is discarded. When the last clone is dropped without a reply
/// the waiting side resumes with a timeout outcome.
#[derive(Clone)]
pub struct ResponsePromise {
    id: MessageId,
    slot: Arc<Mutex<Option<oneshot::Sender<Response>>>>,
}

impl ResponsePromise {
    /// Creates a connected promise / handle pair.
    pub fn channel() -> (ResponsePromise, ResponseHandle) {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let promise = ResponsePromise {
            id,
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (promise, ResponseHandle { id, rx })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Writes the reply. Returns `false` if a reply was already written or
    /// the caller stopped waiting.
    pub fn deliver(&self, response: Response) -> bool {
        match self.slot.lock().take() {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Whether no reply has been written yet.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl fmt::Debug for ResponsePromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePromise")
            .field("id", &self.id)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Reading half of a one-shot response channel.
#[derive(Debug)]
pub struct ResponseHandle {
    id: MessageId,
    rx: oneshot::Receiver<Response>,
}

impl ResponseHandle {
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Suspends until the reply arrives or `timeout_duration` elapses.
    ///
    /// A request whose promise was dropped unanswered (dead target, handler
    /// without reply) resolves to the same timeout outcome.
    pub async fn wait(self, timeout_duration: Duration) -> Result<Response, RequestError> {
        match timeout(timeout_duration, self.rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) | Err(_) => Err(RequestError::Timeout(timeout_duration)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_delivery_wins() {
        let (promise, handle) = ResponsePromise::channel();
        let copy = promise.clone();
        assert!(promise.deliver(Response::new(Address::invalid(), Payload::new(1u8))));
        assert!(!copy.deliver(Response::new(Address::invalid(), Payload::new(2u8))));
        assert!(!copy.is_pending());

        let response = handle.wait(Duration::from_millis(50)).await.unwrap();
        assert_eq!(response.value::<u8>().unwrap(), 1);
    }

    #[tokio::test]
    async fn dropped_promise_resolves_as_timeout() {
        let (promise, handle) = ResponsePromise::channel();
        drop(promise);
        let outcome = handle.wait(Duration::from_secs(5)).await;
        assert_eq!(outcome.unwrap_err(), RequestError::Timeout(Duration::from_secs(5)));
    }
}
