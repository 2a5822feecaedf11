//! # Actor Error Types
//!
//! ## Design Philosophy
//!
//! - A failing behavior terminates only its own actor; `ActorError` is the
//!   value that carries the failure into the abnormal exit reason
//! - A synchronous send that gets no reply is an ordinary outcome
//!   (`RequestError`), never a fatal condition
//! - Sending to a terminated actor is not an error at all
//!
//! ## Usage Example
//!
//! ```rust
//! use aviary_api::errors::ActorError;
//!
//! fn check(input: i32) -> Result<i32, ActorError> {
//!     if input < 0 {
//!         return Err(ActorError::handler("negative input"));
//!     }
//!     Ok(input)
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

/// Failure raised while an actor handles a message.
#[derive(Error, Debug)]
pub enum ActorError {
    /// The handler rejected the message.
    #[error("Message handling failed: {0}")]
    MessageHandlingError(String),

    /// The handler panicked; carries the panic text.
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// A message arrived that the behavior cannot accept.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActorError {
    pub fn handler<E: ToString>(err: E) -> Self {
        ActorError::MessageHandlingError(err.to_string())
    }
}

/// Outcome of a synchronous send that did not produce a usable reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No reply within the deadline, or the target went away first.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The reply had a different type than the caller asked for.
    #[error("Unexpected reply type: expected {expected}, got {actual}")]
    UnexpectedReply {
        expected: &'static str,
        actual: &'static str,
    },
}
