use std::any::Any;
use std::fmt;
use std::time::Duration;

use aviary_api::{
    ActorResult, Address, Envelope, ExitReason, ExitSignal, Message, MessageId, RequestError,
    Response, ResponseHandle, ResponsePromise,
};

use crate::actor::behavior::Behavior;
use crate::config::ActorConfig;
use crate::error::SpawnError;
use crate::system::ActorSystem;

/// Callback run by the actor once a synchronous send resolves.
pub type Continuation<S> = Box<
    dyn FnOnce(&mut S, &mut Context<S>, Result<Response, RequestError>) -> ActorResult<()> + Send,
>;

/// A request issued from a handler, waiting to be picked up by the run loop.
pub(crate) struct PendingRequest<S> {
    pub(crate) handle: ResponseHandle,
    pub(crate) timeout: Duration,
    pub(crate) continuation: Continuation<S>,
    /// Whether the mailbox stays paused until the response arrives.
    pub(crate) suspends: bool,
}

/// Handle given to every handler for interacting with the runtime.
///
/// Besides sending, the context records what the handler wants to happen
/// after it returns: termination, a behavior change, a stash replay, or new
/// outstanding requests. The run loop applies those once the handler is done.
pub struct Context<S> {
    address: Address,
    system: ActorSystem,
    trap_exit: bool,
    current_sender: Address,
    current_promise: Option<ResponsePromise>,
    pub(crate) planned_exit: Option<ExitReason>,
    pub(crate) next_behavior: Option<Behavior<S>>,
    pub(crate) replay_requested: bool,
    pub(crate) new_requests: Vec<PendingRequest<S>>,
}

impl<S: Send + 'static> Context<S> {
    pub(crate) fn new(address: Address, system: ActorSystem, trap_exit: bool) -> Self {
        Self {
            address,
            system,
            trap_exit,
            current_sender: Address::invalid(),
            current_promise: None,
            planned_exit: None,
            next_behavior: None,
            replay_requested: false,
            new_requests: Vec::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Sender of the message being handled; for a continuation, the actor
    /// that replied.
    pub fn current_sender(&self) -> &Address {
        &self.current_sender
    }

    pub fn is_trapping_exit(&self) -> bool {
        self.trap_exit
    }

    /// When set, exit signals arrive as `Message::Exit` instead of
    /// terminating the actor.
    pub fn trap_exit(&mut self, enabled: bool) {
        self.trap_exit = enabled;
    }

    pub fn send<T: Any + Send + Sync>(&self, target: &Address, value: T) -> bool {
        self.send_message(target, Message::user(value))
    }

    pub fn send_message(&self, target: &Address, message: Message) -> bool {
        target.enqueue(Envelope::new(self.address.clone(), message))
    }

    /// Passes `message` on with the original sender and response channel,
    /// so the final receiver replies straight to the requester.
    pub fn forward(&self, target: &Address, message: Message) -> bool {
        let mut envelope = Envelope::new(self.current_sender.clone(), message);
        envelope.response = self.current_promise.clone();
        target.enqueue(envelope)
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

    pub fn unlink(&self, target: &Address) {
        self.system.unlink(&self.address, target);
    }

    pub fn spawn<T: Send + 'static>(
        &self,
        state: T,
        behavior: Behavior<T>,
    ) -> Result<Address, SpawnError> {
        self.system.spawn(state, behavior)
    }

    pub fn spawn_with_config<T: Send + 'static>(
        &self,
        config: ActorConfig,
        state: T,
        behavior: Behavior<T>,
    ) -> Result<Address, SpawnError> {
        self.system.spawn_with_config(config, state, behavior)
    }

    /// Sends `value` as a request. The returned builder decides how the
    /// response is handled; dropping it ignores the response.
    pub fn request<T: Any + Send + Sync>(
        &mut self,
        target: &Address,
        value: T,
        timeout: Duration,
    ) -> RequestBuilder<'_, S> {
        self.request_message(target, Message::user(value), timeout)
    }

    pub fn request_message(
        &mut self,
        target: &Address,
        message: Message,
        timeout: Duration,
    ) -> RequestBuilder<'_, S> {
        let (promise, handle) = ResponsePromise::channel();
        // A dead target drops the envelope and with it the promise, which
        // resolves the handle immediately.
        target.enqueue(Envelope::new(self.address.clone(), message).with_response(promise));
        RequestBuilder {
            ctx: self,
            handle,
            timeout,
        }
    }

    /// Takes over the response channel of the current request so the reply
    /// can be delivered later, possibly by another actor.
    pub fn make_response_promise(&mut self) -> Option<ResponsePromise> {
        self.current_promise.take()
    }

    /// Terminates the actor with `reason` once the current handler returns.
    pub fn quit(&mut self, reason: ExitReason) {
        self.planned_exit.get_or_insert(reason);
    }

    /// Replaces the behavior once the current handler returns and replays
    /// the stash against it.
    pub fn become_(&mut self, behavior: Behavior<S>) {
        self.next_behavior = Some(behavior);
    }

    pub fn replay_stash(&mut self) {
        self.replay_requested = true;
    }

    pub(crate) fn begin(&mut self, sender: Address, promise: Option<ResponsePromise>) {
        self.current_sender = sender;
        self.current_promise = promise;
    }

    pub(crate) fn take_promise(&mut self) -> Option<ResponsePromise> {
        self.current_promise.take()
    }

    pub(crate) fn end(&mut self) {
        self.current_sender = Address::invalid();
        self.current_promise = None;
    }
}

impl<S> fmt::Debug for Context<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("address", &self.address)
            .field("trap_exit", &self.trap_exit)
            .field("current_sender", &self.current_sender)
            .field("pending_requests", &self.new_requests.len())
            .finish()
    }
}

/// Chooses how the response to a request is handled.
#[must_use = "the response is ignored unless `then` or `await_response` is called"]
pub struct RequestBuilder<'a, S> {
    ctx: &'a mut Context<S>,
    handle: ResponseHandle,
    timeout: Duration,
}

impl<'a, S: Send + 'static> RequestBuilder<'a, S> {
    pub fn id(&self) -> MessageId {
        self.handle.id()
    }

    /// Runs `f` when the response arrives; other messages keep flowing
    /// in the meantime.
    pub fn then<F>(self, f: F)
    where
        F: FnOnce(&mut S, &mut Context<S>, Result<Response, RequestError>) -> ActorResult<()>
            + Send
            + 'static,
    {
        self.register(Box::new(f), false);
    }

    /// Runs `f` when the response arrives; the mailbox is paused until then.
    /// Exit signals are still honoured.
    pub fn await_response<F>(self, f: F)
    where
        F: FnOnce(&mut S, &mut Context<S>, Result<Response, RequestError>) -> ActorResult<()>
            + Send
            + 'static,
    {
        self.register(Box::new(f), true);
    }

    fn register(self, continuation: Continuation<S>, suspends: bool) {
        self.ctx.new_requests.push(PendingRequest {
            handle: self.handle,
            timeout: self.timeout,
            continuation,
            suspends,
        });
    }
}
