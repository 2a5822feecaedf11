//! # Runtime Error Types
//!
//! ## Key Concepts
//! - SpawnError: an actor could not be started
//! - SystemError: system-wide operations such as construction and shutdown
//! - MailboxError: a push into a closed mailbox
//!
//! Failures inside a behavior are `aviary_api::ActorError` and never leave
//! the actor that raised them.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SpawnError {
    #[error("actor system is shutting down")]
    SystemShutdown,
    /// The OS thread or runtime for a dedicated actor could not be created.
    #[error("dedicated actor thread setup failed: {0}")]
    ThreadSetup(String),
}

#[derive(Error, Debug)]
pub enum SystemError {
    /// `ActorSystem::new` was called outside a tokio runtime.
    #[error("no tokio runtime to host the actor system")]
    NoRuntime,
    #[error("shutdown already requested")]
    ShuttingDown,
    #[error("actors still running {0:?} after shutdown began")]
    ShutdownTimeout(Duration),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Returned when pushing into the mailbox of a terminated actor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("mailbox closed")]
    Closed,
}
