//! # Mailbox Module
//!
//! ## Key Concepts
//! - User lane: FIFO queue of envelopes, per sender in send order
//! - Control lane: exit signals, always read before the user lane
//! - Closing: once the owning actor terminates every push is refused and
//!   whatever is still queued gets dropped

use std::sync::atomic::{AtomicBool, Ordering};

use flume::{Receiver, Sender};

use aviary_api::{Envelope, ExitSignal};

use crate::error::MailboxError;

/// Creates an unbounded mailbox with a user lane and a priority control lane.
pub(crate) fn channel() -> (MailboxSender, MailboxReceiver) {
    let (user_tx, user_rx) = flume::unbounded();
    let (control_tx, control_rx) = flume::unbounded();
    (
        MailboxSender {
            user: user_tx,
            control: control_tx,
            closed: AtomicBool::new(false),
        },
        MailboxReceiver {
            user: user_rx,
            control: control_rx,
        },
    )
}

/// Producer side of a mailbox, shared by every sender through the actor cell.
///
/// Each flume lane is FIFO, which gives per-(sender, receiver) ordering for
/// free; nothing orders messages across lanes.
#[derive(Debug)]
pub struct MailboxSender {
    user: Sender<Envelope>,
    control: Sender<ExitSignal>,
    /// Flag indicating if this mailbox has been closed
    closed: AtomicBool,
}

impl MailboxSender {
    pub fn push(&self, envelope: Envelope) -> Result<(), MailboxError> {
        if self.is_closed() {
            return Err(MailboxError::Closed);
        }
        self.user.send(envelope).map_err(|_| MailboxError::Closed)
    }

    pub fn push_signal(&self, signal: ExitSignal) -> Result<(), MailboxError> {
        if self.is_closed() {
            return Err(MailboxError::Closed);
        }
        self.control.send(signal).map_err(|_| MailboxError::Closed)
    }

    /// Rejects every later push. Already queued messages stay until drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of queued user messages (snapshot in time).
    pub fn len(&self) -> usize {
        self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty()
    }
}

/// Consumer side of a mailbox, owned by whoever drives the actor.
#[derive(Debug)]
pub struct MailboxReceiver {
    user: Receiver<Envelope>,
    control: Receiver<ExitSignal>,
}

impl MailboxReceiver {
    pub async fn recv_envelope(&self) -> Option<Envelope> {
        self.user.recv_async().await.ok()
    }

    pub async fn recv_signal(&self) -> Option<ExitSignal> {
        self.control.recv_async().await.ok()
    }

    pub fn try_signal(&self) -> Option<ExitSignal> {
        self.control.try_recv().ok()
    }

    /// Drops everything still queued and returns how many messages were lost.
    pub fn drain(&self) -> usize {
        self.user.drain().count() + self.control.drain().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviary_api::{Address, ExitReason, Message};

    #[tokio::test]
    async fn lanes_are_fifo_and_independent() {
        let (tx, rx) = channel();
        tx.push(Envelope::new(Address::invalid(), Message::user(1u32))).unwrap();
        tx.push(Envelope::new(Address::invalid(), Message::user(2u32))).unwrap();
        tx.push_signal(ExitSignal::new(Address::invalid(), ExitReason::UserShutdown))
            .unwrap();

        assert_eq!(tx.len(), 2);
        assert_eq!(rx.try_signal().map(|s| s.reason), Some(ExitReason::UserShutdown));

        let first = rx.recv_envelope().await.unwrap();
        let second = rx.recv_envelope().await.unwrap();
        assert_eq!(first.message.payload().unwrap().get::<u32>(), Some(&1));
        assert_eq!(second.message.payload().unwrap().get::<u32>(), Some(&2));
    }

    #[test]
    fn closed_mailbox_rejects_pushes() {
        let (tx, rx) = channel();
        tx.push(Envelope::new(Address::invalid(), Message::user("queued")))
            .unwrap();
        tx.close();

        let result = tx.push(Envelope::new(Address::invalid(), Message::user("late")));
        assert_eq!(result.unwrap_err(), MailboxError::Closed);
        assert_eq!(rx.drain(), 1);
    }
}
