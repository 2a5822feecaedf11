//! Routing policies deciding which workers receive a message.

use std::fmt;

use rand::seq::SliceRandom;

use aviary_api::{Address, Message};

/// Picks the recipients of one message from the current worker list.
///
/// Called only from the router's own handler, so implementations may keep
/// mutable state without synchronization. An empty result drops the message.
pub trait RoutingPolicy: fmt::Debug + Send {
    fn select(&mut self, workers: &[Address], message: &Message) -> Vec<Address>;
}

/// The built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingPolicyKind {
    #[default]
    RoundRobin,
    Random,
    Broadcast,
}

impl RoutingPolicyKind {
    pub fn build(self) -> Box<dyn RoutingPolicy> {
        match self {
            RoutingPolicyKind::RoundRobin => Box::new(RoundRobin::default()),
            RoutingPolicyKind::Random => Box::new(Random),
            RoutingPolicyKind::Broadcast => Box::new(Broadcast),
        }
    }
}

/// Cycles through the workers; a worker that already terminated is skipped.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoutingPolicy for RoundRobin {
    fn select(&mut self, workers: &[Address], _message: &Message) -> Vec<Address> {
        if workers.is_empty() {
            return Vec::new();
        }
        let start = self.cursor % workers.len();
        let index = (0..workers.len())
            .map(|offset| (start + offset) % workers.len())
            .find(|&index| workers[index].is_alive())
            .unwrap_or(start);
        self.cursor = (index + 1) % workers.len();
        vec![workers[index].clone()]
    }
}

/// Picks one worker uniformly at random, preferring live ones.
#[derive(Debug, Default)]
pub struct Random;

impl RoutingPolicy for Random {
    fn select(&mut self, workers: &[Address], _message: &Message) -> Vec<Address> {
        let live: Vec<&Address> = workers.iter().filter(|worker| worker.is_alive()).collect();
        let mut rng = rand::thread_rng();
        let chosen = if live.is_empty() {
            workers.choose(&mut rng)
        } else {
            live.choose(&mut rng).copied()
        };
        chosen.cloned().into_iter().collect()
    }
}

/// Sends a copy to every worker.
#[derive(Debug, Default)]
pub struct Broadcast;

impl RoutingPolicy for Broadcast {
    fn select(&mut self, workers: &[Address], _message: &Message) -> Vec<Address> {
        workers.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use aviary_api::{next_actor_id, Channel, Envelope, ExitReason, ExitSignal, WeakChannel};

    #[derive(Debug, Default)]
    struct StubChannel {
        dead: AtomicBool,
    }

    impl Channel for StubChannel {
        fn enqueue(&self, _envelope: Envelope) -> bool {
            !self.is_terminated()
        }

        fn signal_exit(&self, _signal: ExitSignal) -> bool {
            !self.is_terminated()
        }

        fn is_terminated(&self) -> bool {
            self.dead.load(Ordering::SeqCst)
        }

        fn exit_reason(&self) -> Option<ExitReason> {
            None
        }
    }

    fn workers(count: usize) -> (Vec<Arc<StubChannel>>, Vec<Address>) {
        let channels: Vec<Arc<StubChannel>> =
            (0..count).map(|_| Arc::new(StubChannel::default())).collect();
        let addresses = channels
            .iter()
            .map(|channel| {
                let weak: WeakChannel = Arc::downgrade(channel) as WeakChannel;
                Address::new(next_actor_id(), weak)
            })
            .collect();
        (channels, addresses)
    }

    fn message() -> Message {
        Message::user(1u8)
    }

    #[test]
    fn round_robin_cycles_in_order() {
        let (_channels, workers) = workers(3);
        let mut policy = RoundRobin::default();

        let picked: Vec<Address> = (0..6)
            .flat_map(|_| policy.select(&workers, &message()))
            .collect();

        let expected: Vec<Address> = workers.iter().chain(workers.iter()).cloned().collect();
        assert_eq!(picked, expected);
    }

    #[test]
    fn round_robin_skips_dead_workers() {
        let (channels, workers) = workers(3);
        let mut policy = RoundRobin::default();
        channels[1].dead.store(true, Ordering::SeqCst);

        assert_eq!(policy.select(&workers, &message()), vec![workers[0].clone()]);
        assert_eq!(policy.select(&workers, &message()), vec![workers[2].clone()]);
        assert_eq!(policy.select(&workers, &message()), vec![workers[0].clone()]);
    }

    #[test]
    fn round_robin_survives_shrinking_list() {
        let (_channels, workers) = workers(4);
        let mut policy = RoundRobin::default();
        for _ in 0..3 {
            policy.select(&workers, &message());
        }

        let shrunk = &workers[..2];
        let picked = policy.select(shrunk, &message());
        assert_eq!(picked.len(), 1);
        assert!(shrunk.contains(&picked[0]));
    }

    #[test]
    fn random_only_picks_live_workers() {
        let (channels, workers) = workers(4);
        channels[0].dead.store(true, Ordering::SeqCst);
        channels[3].dead.store(true, Ordering::SeqCst);
        let mut policy = Random;

        let seen: HashSet<Address> = (0..200)
            .flat_map(|_| policy.select(&workers, &message()))
            .collect();

        let expected: HashSet<Address> = [workers[1].clone(), workers[2].clone()].into();
        assert_eq!(seen, expected);
    }

    #[test]
    fn broadcast_selects_everyone() {
        let (_channels, workers) = workers(5);
        let mut policy = Broadcast;
        assert_eq!(policy.select(&workers, &message()), workers);
    }

    #[test]
    fn empty_worker_list_selects_nobody() {
        for kind in [
            RoutingPolicyKind::RoundRobin,
            RoutingPolicyKind::Random,
            RoutingPolicyKind::Broadcast,
        ] {
            let mut policy = kind.build();
            assert!(policy.select(&[], &message()).is_empty());
        }
    }
}
