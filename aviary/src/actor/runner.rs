use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::warn;

use aviary_api::{
    ActorError, ActorResult, Address, BoxedFuture, Envelope, ExitMsg, ExitReason, ExitSignal,
    Message, MessageId, RequestError, Response,
};

use crate::actor::behavior::{Behavior, Reply};
use crate::actor::cell::ActorCell;
use crate::actor::context::{Context, Continuation, PendingRequest};
use crate::mailbox::MailboxReceiver;
use crate::{log_error, log_lifecycle, log_message};

type Resolved = (MessageId, Result<Response, RequestError>);

enum Input {
    Signal(ExitSignal),
    Envelope(Envelope),
    Resolved(Resolved),
    Closed,
}

/// Drives one actor: pulls messages, runs handlers one at a time and
/// performs the termination sequence.
pub(crate) struct ActorRunner<S> {
    cell: Arc<ActorCell>,
    state: S,
    behavior: Behavior<S>,
    ctx: Context<S>,
    mailbox: MailboxReceiver,
    stash: VecDeque<Envelope>,
    replay: VecDeque<Envelope>,
    pending: FuturesUnordered<BoxedFuture<'static, Resolved>>,
    continuations: HashMap<MessageId, (Continuation<S>, bool)>,
    /// Outstanding requests that pause the mailbox.
    suspended: usize,
}

impl<S: Send + 'static> ActorRunner<S> {
    pub(crate) fn new(
        cell: Arc<ActorCell>,
        state: S,
        behavior: Behavior<S>,
        ctx: Context<S>,
        mailbox: MailboxReceiver,
    ) -> Self {
        Self {
            cell,
            state,
            behavior,
            ctx,
            mailbox,
            stash: VecDeque::new(),
            replay: VecDeque::new(),
            pending: FuturesUnordered::new(),
            continuations: HashMap::new(),
            suspended: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        log_lifecycle!(self.ctx.address(), "started");

        let reason = loop {
            if let Some(reason) = self.ctx.planned_exit.take() {
                break reason;
            }
            // Exit signals pre-empt everything else, including replays.
            if let Some(signal) = self.mailbox.try_signal() {
                self.on_exit_signal(signal);
                continue;
            }
            if self.suspended == 0 {
                if let Some(envelope) = self.replay.pop_front() {
                    self.on_envelope(envelope);
                    continue;
                }
            }

            let suspended = self.suspended > 0;
            let input = {
                let mailbox = &self.mailbox;
                let pending = &mut self.pending;
                tokio::select! {
                    biased;
                    signal = mailbox.recv_signal() => match signal {
                        Some(signal) => Input::Signal(signal),
                        None => Input::Closed,
                    },
                    Some(resolved) = pending.next(), if !pending.is_empty() => Input::Resolved(resolved),
                    envelope = mailbox.recv_envelope(), if !suspended => match envelope {
                        Some(envelope) => Input::Envelope(envelope),
                        None => Input::Closed,
                    },
                }
            };

            match input {
                Input::Signal(signal) => self.on_exit_signal(signal),
                Input::Envelope(envelope) => self.on_envelope(envelope),
                Input::Resolved((id, outcome)) => self.on_resolved(id, outcome),
                Input::Closed => break ExitReason::Unknown,
            }
        };

        self.terminate(reason);
    }

    fn on_exit_signal(&mut self, signal: ExitSignal) {
        log_lifecycle!(
            self.ctx.address(),
            "exit_signal",
            source = %signal.source,
            reason = %signal.reason,
            trapped = self.ctx.is_trapping_exit()
        );
        if !self.ctx.is_trapping_exit() {
            self.ctx.quit(signal.reason);
            return;
        }

        let reason = signal.reason.clone();
        let envelope = Envelope::new(
            signal.source.clone(),
            Message::Exit(ExitMsg {
                source: signal.source,
                reason: signal.reason,
            }),
        );
        // A trapped exit nobody handles still terminates the actor.
        if self.dispatch(envelope).is_some() {
            self.ctx.quit(reason);
        }
    }

    fn on_envelope(&mut self, envelope: Envelope) {
        if let Some(unmatched) = self.dispatch(envelope) {
            log_message!(unmatched.message.tag(), "stashed", actor = %self.ctx.address());
            self.stash.push_back(unmatched);
        }
    }

    /// Runs the behavior on one envelope. Hands the envelope back, response
    /// channel included, when no case accepted it.
    fn dispatch(&mut self, mut envelope: Envelope) -> Option<Envelope> {
        self.ctx.begin(envelope.sender.clone(), envelope.response.take());
        let tag = envelope.message.tag();

        let outcome = {
            let Self {
                state,
                behavior,
                ctx,
                ..
            } = self;
            panic::catch_unwind(AssertUnwindSafe(|| {
                behavior.dispatch(state, ctx, &envelope.message)
            }))
        };

        let result = match outcome {
            Ok(None) => {
                envelope.response = self.ctx.take_promise();
                self.ctx.end();
                return Some(envelope);
            }
            Ok(Some(result)) => result,
            Err(panic) => Err(ActorError::Panicked(panic_message(&*panic))),
        };
        log_message!(tag, "handled", actor = %self.ctx.address(), ok = result.is_ok());

        self.finish(result);
        None
    }

    fn on_resolved(&mut self, id: MessageId, outcome: Result<Response, RequestError>) {
        let Some((continuation, suspends)) = self.continuations.remove(&id) else {
            return;
        };
        if suspends {
            self.suspended -= 1;
        }

        let responder = match &outcome {
            Ok(response) => response.sender.clone(),
            Err(_) => Address::invalid(),
        };
        self.ctx.begin(responder, None);

        let result = {
            let Self { state, ctx, .. } = self;
            panic::catch_unwind(AssertUnwindSafe(|| continuation(state, ctx, outcome)))
                .unwrap_or_else(|panic| Err(ActorError::Panicked(panic_message(&*panic))))
        };
        self.finish(result.map(|()| Reply::None));
    }

    /// Applies everything a handler asked for once it has returned.
    fn finish(&mut self, result: ActorResult<Reply>) {
        match result {
            Ok(Reply::Value(payload)) => {
                let response = Response::new(self.ctx.address().clone(), payload);
                match self.ctx.take_promise() {
                    Some(promise) => {
                        promise.deliver(response);
                    }
                    None => {
                        let sender = self.ctx.current_sender().clone();
                        sender.enqueue(Envelope::new(
                            response.sender,
                            Message::User(response.payload),
                        ));
                    }
                }
            }
            Ok(Reply::None) => {}
            Err(err) => {
                warn!(actor = %self.ctx.address(), error = %err, "handler failed");
                self.ctx.quit(ExitReason::abnormal(err));
            }
        }
        self.ctx.end();

        for request in self.ctx.new_requests.drain(..) {
            let PendingRequest {
                handle,
                timeout,
                continuation,
                suspends,
            } = request;
            let id = handle.id();
            if suspends {
                self.suspended += 1;
            }
            self.continuations.insert(id, (continuation, suspends));
            self.pending
                .push(Box::pin(async move { (id, handle.wait(timeout).await) }));
        }

        if let Some(behavior) = self.ctx.next_behavior.take() {
            self.behavior = behavior;
            self.ctx.replay_requested = true;
        }
        if std::mem::take(&mut self.ctx.replay_requested) {
            // Stashed messages go ahead of anything still waiting for replay.
            while let Some(envelope) = self.stash.pop_back() {
                self.replay.push_front(envelope);
            }
        }
    }

    fn terminate(mut self, reason: ExitReason) {
        {
            let Self {
                state,
                behavior,
                ctx,
                ..
            } = &mut self;
            let hook = panic::catch_unwind(AssertUnwindSafe(|| {
                behavior.run_before_stop(state, ctx, &reason)
            }));
            if let Err(panic) = hook {
                log_error!(panic_message(&*panic), actor = %ctx.address(), "before_stop panicked");
            }
        }

        let Self {
            cell,
            ctx,
            mailbox,
            stash,
            replay,
            continuations,
            ..
        } = self;
        let address = ctx.address().clone();
        cell.mark_terminated(reason.clone());
        let dropped = mailbox.drain() + stash.len() + replay.len();
        drop((stash, replay, continuations));
        // Reaped: only the exit record outlives the cell from here on.
        drop(cell);

        ctx.system().on_actor_terminated(&address, &reason);
        log_lifecycle!(address, "terminated", reason = %reason, dropped_messages = dropped);
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
