//! Actor identities for code that is not itself an actor.
//!
//! A [`ScopedActor`] has an address and a mailbox like any other actor, so
//! it can be monitored, receive replies and down-notifications, and issue
//! synchronous sends. It is driven by the async code that owns it instead of
//! a run loop, always traps exits, and terminates normally when dropped.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use aviary_api::{
    next_actor_id, Address, DownMsg, Envelope, ExitMsg, ExitReason, ExitSignal, Message,
    RequestError, Response, ResponsePromise,
};

use crate::actor::ActorCell;
use crate::log_lifecycle;
use crate::mailbox::{self, MailboxReceiver};
use crate::system::ActorSystem;

pub struct ScopedActor {
    system: ActorSystem,
    cell: Arc<ActorCell>,
    address: Address,
    mailbox: MailboxReceiver,
    /// Messages skipped by selective receives.
    stash: VecDeque<Envelope>,
    current_sender: Address,
}

impl ScopedActor {
    pub(crate) fn new(system: ActorSystem) -> Self {
        let (sender, receiver) = mailbox::channel();
        let cell = ActorCell::new(next_actor_id(), Some("scoped".to_string()), sender);
        let address = cell.address();
        log_lifecycle!(address, "spawned", kind = "scoped");
        Self {
            system,
            cell,
            address,
            mailbox: receiver,
            stash: VecDeque::new(),
            current_sender: Address::invalid(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Sender of the last received message or response.
    pub fn current_sender(&self) -> &Address {
        &self.current_sender
    }

    pub fn send<T: Any + Send + Sync>(&self, target: &Address, value: T) -> bool {
        self.send_message(target, Message::user(value))
    }

    pub fn send_message(&self, target: &Address, message: Message) -> bool {
        target.enqueue(Envelope::new(self.address.clone(), message))
    }

    pub fn send_exit(&self, target: &Address, reason: ExitReason) -> bool {
        target.signal_exit(ExitSignal::new(self.address.clone(), reason))
    }

    pub fn monitor(&self, target: &Address) {
        self.system.monitor(&self.address, target);
    }

    pub fn demonitor(&self, target: &Address) -> bool {
        self.system.demonitor(&self.address, target)
    }

    pub fn link(&self, target: &Address) {
        self.system.link(&self.address, target);
    }

    /// Synchronous send: suspends until the target replies, the target
    /// terminates, or `timeout` elapses.
    pub async fn request<T: Any + Send + Sync>(
        &mut self,
        target: &Address,
        value: T,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        self.request_message(target, Message::user(value), timeout)
            .await
    }

    /// [`request`](Self::request) with the system's default request timeout.
    pub async fn ask<T: Any + Send + Sync>(
        &mut self,
        target: &Address,
        value: T,
    ) -> Result<Response, RequestError> {
        let timeout = self.system.config().default_request_timeout;
        self.request(target, value, timeout).await
    }

    pub async fn request_message(
        &mut self,
        target: &Address,
        message: Message,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        let (promise, handle) = ResponsePromise::channel();
        target.enqueue(Envelope::new(self.address.clone(), message).with_response(promise));
        let response = handle.wait(timeout).await?;
        self.current_sender = response.sender.clone();
        Ok(response)
    }

    /// Next message in arrival order. Exit signals come first and arrive as
    /// `Message::Exit`.
    pub async fn receive(&mut self, timeout: Duration) -> Option<Envelope> {
        self.receive_matching(timeout, |_| true).await
    }

    /// Next message accepted by `accept`; the others stay queued for later
    /// receives, in order.
    pub async fn receive_matching<F>(&mut self, timeout: Duration, mut accept: F) -> Option<Envelope>
    where
        F: FnMut(&Envelope) -> bool,
    {
        if let Some(index) = self.stash.iter().position(&mut accept) {
            return self.stash.remove(index).map(|envelope| self.take(envelope));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let envelope = timeout_at(deadline, self.next_incoming()).await.ok()??;
            if accept(&envelope) {
                return Some(self.take(envelope));
            }
            self.stash.push_back(envelope);
        }
    }

    pub async fn receive_down(&mut self, timeout: Duration) -> Option<DownMsg> {
        let envelope = self
            .receive_matching(timeout, |envelope| matches!(envelope.message, Message::Down(_)))
            .await?;
        match envelope.message {
            Message::Down(down) => Some(down),
            _ => None,
        }
    }

    /// Waits for a user message carrying a `T`.
    pub async fn receive_value<T: Any + Clone>(&mut self, timeout: Duration) -> Option<T> {
        let envelope = self
            .receive_matching(timeout, |envelope| {
                envelope.message.payload().is_some_and(|payload| payload.is::<T>())
            })
            .await?;
        envelope.message.payload()?.get::<T>().cloned()
    }

    /// Number of messages waiting, including ones skipped by selective receives.
    pub fn pending_messages(&self) -> usize {
        self.stash.len() + self.cell.mailbox_len()
    }

    fn take(&mut self, envelope: Envelope) -> Envelope {
        self.current_sender = envelope.sender.clone();
        envelope
    }

    async fn next_incoming(&self) -> Option<Envelope> {
        if let Some(signal) = self.mailbox.try_signal() {
            return Some(exit_envelope(signal));
        }
        tokio::select! {
            biased;
            Some(signal) = self.mailbox.recv_signal() => Some(exit_envelope(signal)),
            Some(envelope) = self.mailbox.recv_envelope() => Some(envelope),
            else => None,
        }
    }
}

fn exit_envelope(signal: ExitSignal) -> Envelope {
    Envelope::new(
        signal.source.clone(),
        Message::Exit(ExitMsg {
            source: signal.source,
            reason: signal.reason,
        }),
    )
}

impl Drop for ScopedActor {
    fn drop(&mut self) {
        if self.cell.mark_terminated(ExitReason::Normal) {
            self.mailbox.drain();
            self.system
                .on_actor_terminated(&self.address, &ExitReason::Normal);
            log_lifecycle!(self.address, "terminated", reason = %ExitReason::Normal);
        }
    }
}

impl std::fmt::Debug for ScopedActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedActor")
            .field("address", &self.address)
            .field("stashed", &self.stash.len())
            .finish()
    }
}
