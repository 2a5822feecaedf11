//! # Actor Address Module
//!
//! ## Key Concepts
//! - ActorId: process-wide unique numeric identity, never reused
//! - Address: comparable handle used to reach an actor's mailbox
//! - Channel: delivery seam implemented by the runtime's actor cell
//!
//! ## Design Principles
//! - An Address never keeps its actor alive; it holds a weak reference to
//!   the delivery channel and silently drops messages once the actor is gone
//! - The exit reason outlives the actor: it sits in an `ExitRecord` every
//!   Address shares with the actor's cell
//! - Equality, ordering and hashing use the numeric identity only
//! - Thread safety: all types are Send + Sync and cheap to clone

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use crate::exit::{ExitReason, ExitRecord, ExitSignal};
use crate::message::Envelope;

/// Numeric actor identity.
pub type ActorId = u64;

/// Identity that is never handed out to a live actor.
pub const INVALID_ACTOR_ID: ActorId = 0;

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(INVALID_ACTOR_ID + 1);

/// Allocates a fresh actor identity.
pub fn next_actor_id() -> ActorId {
    NEXT_ACTOR_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Delivery interface of an actor, implemented by the runtime.
///
/// Every method must be callable from any thread and must never block on
/// the receiving actor's progress.
pub trait Channel: Send + Sync + fmt::Debug {
    /// Pushes an envelope into the user lane of the mailbox.
    ///
    /// Returns `false` when the actor has terminated and the envelope was
    /// dropped.
    fn enqueue(&self, envelope: Envelope) -> bool;

    /// Pushes an exit signal into the priority lane of the mailbox.
    fn signal_exit(&self, signal: ExitSignal) -> bool;

    /// Whether the actor has published its termination.
    fn is_terminated(&self) -> bool;

    /// The recorded exit reason, once terminated.
    fn exit_reason(&self) -> Option<ExitReason>;
}

/// Weak handle to a delivery channel.
pub type WeakChannel = Weak<dyn Channel>;

/// Channel type backing the `invalid` sentinel; it can never be upgraded.
#[derive(Debug)]
struct NullChannel;

impl Channel for NullChannel {
    fn enqueue(&self, _envelope: Envelope) -> bool {
        false
    }

    fn signal_exit(&self, _signal: ExitSignal) -> bool {
        false
    }

    fn is_terminated(&self) -> bool {
        true
    }

    fn exit_reason(&self) -> Option<ExitReason> {
        Some(ExitReason::Unknown)
    }
}

/// # Address
///
/// ## Overview
/// Opaque, comparable identity of an actor. Survives the actor's death:
/// once the actor terminates, sends through the Address become silent
/// no-ops.
///
/// ## Thread Safety
/// - Implements Send + Sync
/// - Clone copies an integer, a weak pointer and an `Arc`
#[derive(Clone)]
pub struct Address {
    id: ActorId,
    channel: WeakChannel,
    exit: Arc<ExitRecord>,
}

impl Address {
    /// Creates an Address for a live channel with its own exit record.
    pub fn new(id: ActorId, channel: WeakChannel) -> Self {
        Self::with_exit_record(id, channel, Arc::new(ExitRecord::new()))
    }

    /// Creates an Address sharing `exit` with the channel's owner.
    pub fn with_exit_record(id: ActorId, channel: WeakChannel, exit: Arc<ExitRecord>) -> Self {
        Self { id, channel, exit }
    }

    /// The distinguished Address that never refers to an actor.
    pub fn invalid() -> Self {
        let channel: WeakChannel = Weak::<NullChannel>::new();
        Self::new(INVALID_ACTOR_ID, channel)
    }

    /// Returns the numeric identity.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Whether this is a real actor identity (alive or not).
    pub fn is_valid(&self) -> bool {
        self.id != INVALID_ACTOR_ID
    }

    /// Upgrades to the delivery channel while the actor is still reachable.
    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.upgrade()
    }

    /// Whether the actor can still accept messages.
    pub fn is_alive(&self) -> bool {
        self.channel()
            .map(|channel| !channel.is_terminated())
            .unwrap_or(false)
    }

    /// Why the actor terminated, if it has. Still answers after the actor
    /// has been reaped.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self.channel() {
            Some(channel) => channel.exit_reason(),
            None => self.exit.get(),
        }
    }

    /// Delivers an envelope; dropped silently when the target is gone.
    pub fn enqueue(&self, envelope: Envelope) -> bool {
        match self.channel() {
            Some(channel) => channel.enqueue(envelope),
            None => false,
        }
    }

    /// Delivers an exit signal; dropped silently when the target is gone.
    pub fn signal_exit(&self, signal: ExitSignal) -> bool {
        match self.channel() {
            Some(channel) => channel.signal_exit(signal),
            None => false,
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Address {}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "actor#{}", self.id)
        } else {
            write!(f, "invalid-actor")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_address_is_never_alive() {
        let addr = Address::invalid();
        assert!(!addr.is_valid());
        assert!(!addr.is_alive());
        assert!(addr.channel().is_none());
        assert_eq!(addr, Address::default());
        assert_eq!(addr.exit_reason(), None);
    }

    #[test]
    fn exit_reason_survives_the_channel() {
        let record = Arc::new(ExitRecord::new());
        let channel = Arc::new(NullChannel);
        let weak: WeakChannel = Arc::downgrade(&channel) as WeakChannel;
        let addr = Address::with_exit_record(next_actor_id(), weak, record.clone());

        record.record(ExitReason::UserShutdown);
        drop(channel);
        assert!(addr.channel().is_none());
        assert_eq!(addr.exit_reason(), Some(ExitReason::UserShutdown));
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = next_actor_id();
        let b = next_actor_id();
        assert!(b > a);
        assert_ne!(a, INVALID_ACTOR_ID);
    }
}
