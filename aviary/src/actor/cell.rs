use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use aviary_api::{
    ActorId, Address, Channel, Envelope, ExitReason, ExitRecord, ExitSignal, WeakChannel,
};

use crate::mailbox::MailboxSender;

/// Shared, thread-safe part of an actor: identity, mailbox producer side
/// and termination record. Addresses point here through a weak reference
/// and share the exit record, which outlives the cell.
#[derive(Debug)]
pub struct ActorCell {
    id: ActorId,
    name: Option<String>,
    mailbox: MailboxSender,
    exit: Arc<ExitRecord>,
    terminated: AtomicBool,
}

impl ActorCell {
    pub(crate) fn new(id: ActorId, name: Option<String>, mailbox: MailboxSender) -> Arc<Self> {
        Arc::new(Self {
            id,
            name,
            mailbox,
            exit: Arc::new(ExitRecord::new()),
            terminated: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn address(self: &Arc<Self>) -> Address {
        let weak: Weak<ActorCell> = Arc::downgrade(self);
        let channel: WeakChannel = weak;
        Address::with_exit_record(self.id, channel, self.exit.clone())
    }

    /// Number of queued user messages (snapshot in time).
    pub fn mailbox_len(&self) -> usize {
        self.mailbox.len()
    }

    /// Records the exit reason and closes the mailbox.
    ///
    /// Returns `false` if the actor had already terminated. The reason is
    /// stored before the flag flips, so anyone observing the flag also
    /// observes the reason.
    pub(crate) fn mark_terminated(&self, reason: ExitReason) -> bool {
        if !self.exit.record(reason) {
            return false;
        }
        self.mailbox.close();
        self.terminated.store(true, Ordering::SeqCst);
        true
    }
}

impl Channel for ActorCell {
    fn enqueue(&self, envelope: Envelope) -> bool {
        !self.is_terminated() && self.mailbox.push(envelope).is_ok()
    }

    fn signal_exit(&self, signal: ExitSignal) -> bool {
        !self.is_terminated() && self.mailbox.push_signal(signal).is_ok()
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn exit_reason(&self) -> Option<ExitReason> {
        self.exit.get()
    }
}
