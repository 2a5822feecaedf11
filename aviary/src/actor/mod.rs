//! # Actor Module
//!
//! The building blocks of a running actor.
//!
//! - [`Behavior`]: ordered message cases plus an optional `before_stop` hook
//! - [`Context`]: what a handler may do: send, request, monitor, link, quit
//! - [`ActorCell`]: the shared half of an actor that addresses point at
//!
//! Each actor is driven by a single run loop, so handlers never run
//! concurrently for the same actor and state needs no locking.

pub mod behavior;
pub mod cell;
pub mod context;
pub(crate) mod runner;

pub use behavior::{Behavior, Reply};
pub use cell::ActorCell;
pub use context::{Context, Continuation, RequestBuilder};
