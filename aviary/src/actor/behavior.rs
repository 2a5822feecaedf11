//! Message handling as an ordered list of cases.
//!
//! A [`Behavior`] tries its cases in the order they were added; the first
//! case that accepts a message handles it. A message no case accepts is
//! stashed by the run loop and replayed after the next behavior change or
//! an explicit [`Context::replay_stash`].

use std::any::Any;
use std::fmt;

use aviary_api::{ActorResult, DownMsg, ExitMsg, ExitReason, Message, Payload, SysMessage};

use crate::actor::context::Context;

/// What a handler produced for the current message.
#[derive(Debug, Default)]
pub enum Reply {
    /// Nothing to send back.
    #[default]
    None,
    /// Sent to the requester, or to the sender for asynchronous messages.
    Value(Payload),
}

impl Reply {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Reply::Value(Payload::new(value))
    }
}

type Case<S> =
    Box<dyn FnMut(&mut S, &mut Context<S>, &Message) -> Option<ActorResult<Reply>> + Send>;
type StopHook<S> = Box<dyn FnMut(&mut S, &mut Context<S>, &ExitReason) + Send>;

fn case<S, F>(handler: F) -> Case<S>
where
    F: FnMut(&mut S, &mut Context<S>, &Message) -> Option<ActorResult<Reply>> + Send + 'static,
{
    Box::new(handler)
}

/// The message handlers of an actor over state `S`.
pub struct Behavior<S> {
    cases: Vec<Case<S>>,
    before_stop: Option<StopHook<S>>,
}

impl<S: Send + 'static> Behavior<S> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            before_stop: None,
        }
    }

    /// Handles user messages carrying a `T`.
    pub fn on<T, F>(mut self, mut handler: F) -> Self
    where
        T: Any,
        F: FnMut(&mut S, &mut Context<S>, &T) -> ActorResult<()> + Send + 'static,
    {
        self.cases.push(case(move |state, ctx, message| {
            let value = message.payload()?.get::<T>()?;
            Some(handler(state, ctx, value).map(|()| Reply::None))
        }));
        self
    }

    /// Handles user messages carrying a `T` and replies with the returned `R`.
    pub fn respond<T, R, F>(mut self, mut handler: F) -> Self
    where
        T: Any,
        R: Any + Send + Sync,
        F: FnMut(&mut S, &mut Context<S>, &T) -> ActorResult<R> + Send + 'static,
    {
        self.cases.push(case(move |state, ctx, message| {
            let value = message.payload()?.get::<T>()?;
            Some(handler(state, ctx, value).map(Reply::value))
        }));
        self
    }

    pub fn on_sys<F>(mut self, mut handler: F) -> Self
    where
        F: FnMut(&mut S, &mut Context<S>, &SysMessage) -> ActorResult<Reply> + Send + 'static,
    {
        self.cases.push(case(move |state, ctx, message| match message {
            Message::Sys(sys) => Some(handler(state, ctx, sys)),
            _ => None,
        }));
        self
    }

    pub fn on_down<F>(mut self, mut handler: F) -> Self
    where
        F: FnMut(&mut S, &mut Context<S>, &DownMsg) -> ActorResult<()> + Send + 'static,
    {
        self.cases.push(case(move |state, ctx, message| match message {
            Message::Down(down) => Some(handler(state, ctx, down).map(|()| Reply::None)),
            _ => None,
        }));
        self
    }

    /// Only reached by actors that trap exits.
    pub fn on_exit<F>(mut self, mut handler: F) -> Self
    where
        F: FnMut(&mut S, &mut Context<S>, &ExitMsg) -> ActorResult<()> + Send + 'static,
    {
        self.cases.push(case(move |state, ctx, message| match message {
            Message::Exit(exit) => Some(handler(state, ctx, exit).map(|()| Reply::None)),
            _ => None,
        }));
        self
    }

    /// Catch-all for user messages no earlier case accepted.
    pub fn others<F>(mut self, mut handler: F) -> Self
    where
        F: FnMut(&mut S, &mut Context<S>, &Payload) -> ActorResult<Reply> + Send + 'static,
    {
        self.cases.push(case(move |state, ctx, message| {
            let payload = message.payload()?;
            Some(handler(state, ctx, payload))
        }));
        self
    }

    /// A raw case. Returning `None` declines the message so later cases,
    /// or the stash, get it.
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut S, &mut Context<S>, &Message) -> Option<ActorResult<Reply>> + Send + 'static,
    {
        self.cases.push(Box::new(handler));
        self
    }

    /// Runs once when the actor terminates, whatever the reason.
    pub fn before_stop<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S, &mut Context<S>, &ExitReason) + Send + 'static,
    {
        self.before_stop = Some(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub(crate) fn dispatch(
        &mut self,
        state: &mut S,
        ctx: &mut Context<S>,
        message: &Message,
    ) -> Option<ActorResult<Reply>> {
        self.cases
            .iter_mut()
            .find_map(|case| case(state, ctx, message))
    }

    pub(crate) fn run_before_stop(&mut self, state: &mut S, ctx: &mut Context<S>, reason: &ExitReason) {
        if let Some(hook) = self.before_stop.as_mut() {
            hook(state, ctx, reason);
        }
    }
}

impl<S: Send + 'static> Default for Behavior<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Behavior<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("cases", &self.cases.len())
            .field("before_stop", &self.before_stop.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::ActorSystem;
    use aviary_api::{ActorError, Address};

    fn context(system: &ActorSystem) -> Context<u32> {
        Context::new(Address::invalid(), system.clone(), false)
    }

    #[tokio::test]
    async fn first_matching_case_wins() {
        let system = ActorSystem::new(Default::default()).unwrap();
        let mut ctx = context(&system);
        let mut state = 0u32;
        let mut behavior = Behavior::<u32>::new()
            .on(|count: &mut u32, _ctx: &mut Context<u32>, n: &u32| {
                *count += *n;
                Ok(())
            })
            .on(|count: &mut u32, _ctx: &mut Context<u32>, _n: &u32| {
                *count = 1000;
                Ok(())
            });

        let outcome = behavior.dispatch(&mut state, &mut ctx, &Message::user(5u32));
        assert!(matches!(outcome, Some(Ok(Reply::None))));
        assert_eq!(state, 5);
    }

    #[tokio::test]
    async fn unmatched_message_is_declined() {
        let system = ActorSystem::new(Default::default()).unwrap();
        let mut ctx = context(&system);
        let mut state = 0u32;
        let mut behavior = Behavior::<u32>::new()
            .respond(|_: &mut u32, _: &mut Context<u32>, text: &String| Ok(text.len()));

        assert!(behavior
            .dispatch(&mut state, &mut ctx, &Message::user(3u8))
            .is_none());
        assert!(behavior
            .dispatch(&mut state, &mut ctx, &Message::Sys(SysMessage::Get))
            .is_none());

        match behavior.dispatch(&mut state, &mut ctx, &Message::user("four".to_string())) {
            Some(Ok(Reply::Value(payload))) => assert_eq!(payload.get::<usize>(), Some(&4)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn handler_errors_are_returned() {
        let system = ActorSystem::new(Default::default()).unwrap();
        let mut ctx = context(&system);
        let mut state = 0u32;
        let mut behavior = Behavior::<u32>::new().on(|_: &mut u32, _: &mut Context<u32>, _: &i64| {
            Err(ActorError::handler("rejected"))
        });

        let outcome = behavior.dispatch(&mut state, &mut ctx, &Message::user(1i64));
        assert!(matches!(outcome, Some(Err(ActorError::MessageHandlingError(_)))));
    }

    #[tokio::test]
    async fn system_cases_only_see_their_kind() {
        let system = ActorSystem::new(Default::default()).unwrap();
        let mut ctx = context(&system);
        let mut state = 0u32;
        let mut behavior = Behavior::<u32>::new()
            .on_down(|seen: &mut u32, _: &mut Context<u32>, _: &DownMsg| {
                *seen += 1;
                Ok(())
            })
            .others(|seen: &mut u32, _: &mut Context<u32>, _: &Payload| {
                *seen += 10;
                Ok(Reply::None)
            });

        let down = Message::Down(DownMsg {
            source: Address::invalid(),
            reason: ExitReason::Normal,
        });
        behavior.dispatch(&mut state, &mut ctx, &down);
        behavior.dispatch(&mut state, &mut ctx, &Message::user(()));
        assert_eq!(state, 11);

        let exit = Message::Exit(ExitMsg {
            source: Address::invalid(),
            reason: ExitReason::UserShutdown,
        });
        assert!(behavior.dispatch(&mut state, &mut ctx, &exit).is_none());
    }
}
