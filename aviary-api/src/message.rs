//! # Actor Message System
//!
//! Messages form a closed sum type: application payloads plus the small set
//! of system messages the runtime and the pool router understand. Dispatch
//! is an exhaustive match on [`Message`]; only the application payload is
//! type-erased.
//!
//! ## Core Components
//!
//! - `Payload`: immutable, cheaply clonable application value
//! - `Message`: `User`, `Sys` (pool control), `Down`, `Exit`
//! - `Envelope`: a message plus sender and optional response channel
//!
//! ## Usage Example
//!
//! ```rust
//! use aviary_api::message::{Message, Payload};
//!
//! let msg = Message::user((1i32, 2i32));
//! let payload = msg.payload().unwrap();
//! assert_eq!(payload.get::<(i32, i32)>(), Some(&(1, 2)));
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::address::Address;
use crate::exit::ExitReason;
use crate::reply::ResponsePromise;

/// Unique identifier for messages and requests.
///
/// Uses UUID v4 so identifiers never collide across systems.
pub type MessageId = Uuid;

/// Type-erased application value.
///
/// Immutable after creation; cloning shares the same allocation, which is
/// what lets a broadcast hand the same value to every worker.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Borrows the value if it has type `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        (*self.value).is::<T>()
    }

    /// Name of the concrete type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Converts into a shared `T`, handing the payload back on mismatch.
    pub fn downcast<T: Any + Send + Sync>(self) -> Result<Arc<T>, Payload> {
        let type_name = self.type_name;
        Arc::downcast::<T>(self.value).map_err(|value| Payload { value, type_name })
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload<{}>", self.type_name)
    }
}

/// Reserved pool-control messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysMessage {
    /// Add a worker to a pool; no reply.
    Put(Address),
    /// Ask a pool for a snapshot of its workers; replies with `Vec<Address>`.
    Get,
}

/// Notification that a monitored actor terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownMsg {
    pub source: Address,
    pub reason: ExitReason,
}

/// An exit signal delivered as a message to an actor that traps exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitMsg {
    pub source: Address,
    pub reason: ExitReason,
}

/// Everything an actor can receive through its mailbox.
#[derive(Debug, Clone)]
pub enum Message {
    User(Payload),
    Sys(SysMessage),
    Down(DownMsg),
    Exit(ExitMsg),
}

impl Message {
    /// Wraps an application value.
    pub fn user<T: Any + Send + Sync>(value: T) -> Self {
        Message::User(Payload::new(value))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Message::User(payload) => Some(payload),
            _ => None,
        }
    }

    /// Short label used in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Message::User(payload) => payload.type_name(),
            Message::Sys(SysMessage::Put(_)) => "sys:put",
            Message::Sys(SysMessage::Get) => "sys:get",
            Message::Down(_) => "down",
            Message::Exit(_) => "exit",
        }
    }
}

/// Container for a message with its routing metadata.
///
/// Created by the sender and consumed exactly once by the receiver.
#[derive(Debug)]
pub struct Envelope {
    /// Unique identifier for this message instance
    pub id: MessageId,
    /// Sending actor, `Address::invalid()` for anonymous sends
    pub sender: Address,
    pub message: Message,
    /// Present for synchronous sends
    pub response: Option<ResponsePromise>,
}

impl Envelope {
    pub fn new(sender: Address, message: Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            message,
            response: None,
        }
    }

    /// Attaches a response channel, turning the envelope into a request.
    pub fn with_response(mut self, promise: ResponsePromise) -> Self {
        self.response = Some(promise);
        self
    }

    pub fn is_request(&self) -> bool {
        self.response.is_some()
    }
}
