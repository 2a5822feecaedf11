//! # Aviary Actor API
//!
//! The data model shared by the Aviary actor runtime and its users:
//! identities, messages, exit reasons and the one-shot reply channel used
//! by synchronous sends.
//!
//! ## Core Components
//!
//! - **Address**: comparable actor identity that outlives the actor
//! - **Message**: closed sum type of application payloads and system messages
//! - **Envelope**: message plus sender and optional response channel
//! - **ExitReason**: why an actor terminated, carried by down-notifications
//! - **ResponsePromise / ResponseHandle**: one-shot reply plumbing
//!
//! ## Module Organization
//!
//! - [`address`]: actor identities and the delivery channel seam
//! - [`message`]: payloads, system messages and envelopes
//! - [`exit`]: exit reasons and exit signals
//! - [`reply`]: response channels for synchronous sends
//! - [`errors`]: error types
//! - [`types`]: common type aliases

pub mod address;
pub mod errors;
pub mod exit;
pub mod message;
pub mod reply;
pub mod types;

pub use address::{next_actor_id, ActorId, Address, Channel, WeakChannel, INVALID_ACTOR_ID};
pub use errors::{ActorError, RequestError};
pub use exit::{ExitReason, ExitRecord, ExitSignal};
pub use message::{DownMsg, Envelope, ExitMsg, Message, MessageId, Payload, SysMessage};
pub use reply::{Response, ResponseHandle, ResponsePromise};
pub use types::{ActorResult, BoxedFuture};
