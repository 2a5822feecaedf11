//! # Death Watch
//!
//! Bookkeeping for monitors and links.
//!
//! A monitor is one-directional: when the target terminates, every watcher
//! receives exactly one `Message::Down`. A link is symmetric: when either
//! side terminates with a reason other than `Normal`, the other side gets an
//! exit signal.
//!
//! Registration and termination serialize on the per-target map entry. The
//! terminating actor publishes its exit flag before taking the entry, and a
//! monitor checks the flag while holding it, so a watcher either lands in
//! the set that gets notified or is notified on the spot, never both.
//!
//! The downs of one termination are enqueued as a batch: anything a watcher
//! does in response, including its own termination, lands in other
//! watchers' mailboxes after them. A pool's watchers therefore see every
//! worker's down before the pool's.

use std::collections::BTreeSet;

use dashmap::DashMap;
use parking_lot::Mutex;

use aviary_api::{ActorId, Address, DownMsg, Envelope, ExitReason, ExitSignal, Message};

#[derive(Debug, Default)]
pub struct DeathWatch {
    /// target -> actors watching it
    watchers: DashMap<ActorId, BTreeSet<Address>>,
    /// watcher -> actors it watches; lets a terminating watcher clean up
    monitoring: DashMap<ActorId, BTreeSet<Address>>,
    /// symmetric link sets
    links: DashMap<ActorId, BTreeSet<Address>>,
    /// Held while one termination enqueues its downs, so a watcher that
    /// reacts to a down by terminating cannot overtake the rest of them.
    notifying: Mutex<()>,
}

impl DeathWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `watcher` for a down-notification about `target`.
    ///
    /// Idempotent. A target that already terminated, or was never valid,
    /// produces an immediate notification with the recorded reason, or
    /// `Unknown` if none is known. Requests from a watcher that is no
    /// longer alive are ignored.
    pub fn monitor(&self, watcher: &Address, target: &Address) {
        if !watcher.is_valid() || watcher == target || !watcher.is_alive() {
            return;
        }

        let reason = {
            let mut entry = self.watchers.entry(target.id()).or_default();
            match target.channel() {
                Some(channel) if !channel.is_terminated() => {
                    // Both directions are written under the target's entry so
                    // a concurrent termination sees either all or nothing.
                    if entry.insert(watcher.clone()) {
                        self.monitoring
                            .entry(watcher.id())
                            .or_default()
                            .insert(target.clone());
                        // The watcher may have been cleaned up meanwhile.
                        if !watcher.is_alive() {
                            entry.remove(watcher);
                            self.forget_target(watcher, target);
                        }
                    }
                    None
                }
                _ => Some(target.exit_reason().unwrap_or(ExitReason::Unknown)),
            }
        };

        self.watchers.remove_if(&target.id(), |_, set| set.is_empty());
        if let Some(reason) = reason {
            deliver_down(watcher, target, reason);
        }
    }

    /// Cancels a monitor. Returns whether one was registered.
    pub fn demonitor(&self, watcher: &Address, target: &Address) -> bool {
        let removed = self
            .watchers
            .get_mut(&target.id())
            .map(|mut set| set.remove(watcher))
            .unwrap_or(false);
        self.watchers.remove_if(&target.id(), |_, set| set.is_empty());

        self.forget_target(watcher, target);
        removed
    }

    /// Links two actors. Linking to a dead actor delivers its exit right away
    /// unless it terminated normally.
    pub fn link(&self, a: &Address, b: &Address) {
        if !a.is_valid() || !b.is_valid() || a == b {
            return;
        }
        if let Err(reason) = self.attach(b, a) {
            if !reason.is_normal() {
                a.signal_exit(ExitSignal::new(b.clone(), reason));
            }
            return;
        }
        if let Err(reason) = self.attach(a, b) {
            self.detach(b, a);
            if !reason.is_normal() {
                b.signal_exit(ExitSignal::new(a.clone(), reason));
            }
        }
    }

    pub fn unlink(&self, a: &Address, b: &Address) {
        self.detach(a, b);
        self.detach(b, a);
    }

    pub fn is_monitoring(&self, watcher: &Address, target: &Address) -> bool {
        self.watchers
            .get(&target.id())
            .map(|set| set.contains(watcher))
            .unwrap_or(false)
    }

    pub fn watcher_count(&self, target: &Address) -> usize {
        self.watchers.get(&target.id()).map(|set| set.len()).unwrap_or(0)
    }

    pub fn is_linked(&self, a: &Address, b: &Address) -> bool {
        self.links
            .get(&a.id())
            .map(|set| set.contains(b))
            .unwrap_or(false)
    }

    /// True when no monitor or link is registered at all.
    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty() && self.monitoring.is_empty() && self.links.is_empty()
    }

    /// Notifies watchers and linked peers of a terminated actor and drops
    /// every entry that mentions it.
    ///
    /// The actor must already be marked terminated.
    pub fn on_terminated(&self, address: &Address, reason: &ExitReason) {
        if let Some((_, watchers)) = self.watchers.remove(&address.id()) {
            let _notifying = self.notifying.lock();
            for watcher in watchers {
                self.forget_target(&watcher, address);
                deliver_down(&watcher, address, reason.clone());
            }
        }

        if let Some((_, targets)) = self.monitoring.remove(&address.id()) {
            for target in targets {
                if let Some(mut set) = self.watchers.get_mut(&target.id()) {
                    set.remove(address);
                }
                self.watchers.remove_if(&target.id(), |_, set| set.is_empty());
            }
        }

        if let Some((_, peers)) = self.links.remove(&address.id()) {
            for peer in peers {
                self.detach(&peer, address);
                if !reason.is_normal() {
                    peer.signal_exit(ExitSignal::new(address.clone(), reason.clone()));
                }
            }
        }
    }

    /// Drops `target` from the reverse index of `watcher`.
    fn forget_target(&self, watcher: &Address, target: &Address) {
        if let Some(mut targets) = self.monitoring.get_mut(&watcher.id()) {
            targets.remove(target);
        }
        self.monitoring.remove_if(&watcher.id(), |_, set| set.is_empty());
    }

    fn attach(&self, owner: &Address, peer: &Address) -> Result<(), ExitReason> {
        let mut entry = self.links.entry(owner.id()).or_default();
        match owner.channel() {
            Some(channel) if !channel.is_terminated() => {
                entry.insert(peer.clone());
                Ok(())
            }
            Some(channel) => {
                drop(entry);
                self.links.remove_if(&owner.id(), |_, set| set.is_empty());
                Err(channel.exit_reason().unwrap_or(ExitReason::Unknown))
            }
            None => {
                drop(entry);
                self.links.remove_if(&owner.id(), |_, set| set.is_empty());
                Err(ExitReason::Unknown)
            }
        }
    }

    fn detach(&self, owner: &Address, peer: &Address) {
        if let Some(mut set) = self.links.get_mut(&owner.id()) {
            set.remove(peer);
        }
        self.links.remove_if(&owner.id(), |_, set| set.is_empty());
    }
}

fn deliver_down(watcher: &Address, source: &Address, reason: ExitReason) {
    watcher.enqueue(Envelope::new(
        source.clone(),
        Message::Down(DownMsg {
            source: source.clone(),
            reason,
        }),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use aviary_api::{next_actor_id, Channel, ExitRecord, WeakChannel};

    // Channel that records deliveries instead of running an actor.
    #[derive(Debug, Default)]
    struct Recorder {
        inbox: Mutex<Vec<Envelope>>,
        signals: Mutex<Vec<ExitSignal>>,
        reason: Mutex<Option<ExitReason>>,
        dead: AtomicBool,
    }

    impl Recorder {
        fn kill(&self, reason: ExitReason) {
            *self.reason.lock().unwrap() = Some(reason);
            self.dead.store(true, Ordering::SeqCst);
        }

        fn downs(&self) -> Vec<DownMsg> {
            self.inbox
                .lock()
                .unwrap()
                .iter()
                .filter_map(|env| match &env.message {
                    Message::Down(down) => Some(down.clone()),
                    _ => None,
                })
                .collect()
        }

        fn signals(&self) -> Vec<ExitSignal> {
            self.signals.lock().unwrap().clone()
        }
    }

    impl Channel for Recorder {
        fn enqueue(&self, envelope: Envelope) -> bool {
            self.inbox.lock().unwrap().push(envelope);
            true
        }

        fn signal_exit(&self, signal: ExitSignal) -> bool {
            self.signals.lock().unwrap().push(signal);
            true
        }

        fn is_terminated(&self) -> bool {
            self.dead.load(Ordering::SeqCst)
        }

        fn exit_reason(&self) -> Option<ExitReason> {
            self.reason.lock().unwrap().clone()
        }
    }

    fn recorder() -> (Arc<Recorder>, Address) {
        let recorder = Arc::new(Recorder::default());
        let weak: WeakChannel = Arc::downgrade(&recorder) as WeakChannel;
        (recorder, Address::new(next_actor_id(), weak))
    }

    fn terminate(watch: &DeathWatch, recorder: &Recorder, address: &Address, reason: ExitReason) {
        recorder.kill(reason.clone());
        watch.on_terminated(address, &reason);
    }

    #[test]
    fn every_watcher_gets_one_down() {
        let watch = DeathWatch::new();
        let (w1, watcher1) = recorder();
        let (w2, watcher2) = recorder();
        let (t, target) = recorder();

        watch.monitor(&watcher1, &target);
        watch.monitor(&watcher1, &target);
        watch.monitor(&watcher2, &target);
        assert_eq!(watch.watcher_count(&target), 2);

        terminate(&watch, &t, &target, ExitReason::UserShutdown);

        assert_eq!(
            w1.downs(),
            vec![DownMsg {
                source: target.clone(),
                reason: ExitReason::UserShutdown
            }]
        );
        assert_eq!(w2.downs().len(), 1);
        assert!(watch.is_empty());
    }

    #[test]
    fn monitoring_a_dead_actor_notifies_immediately() {
        let watch = DeathWatch::new();
        let (w, watcher) = recorder();
        let (t, target) = recorder();
        t.kill(ExitReason::abnormal("crashed"));

        watch.monitor(&watcher, &target);
        watch.monitor(&watcher, &Address::invalid());

        let downs = w.downs();
        assert_eq!(downs.len(), 2);
        assert_eq!(downs[0].reason, ExitReason::abnormal("crashed"));
        assert_eq!(downs[1].reason, ExitReason::Unknown);
        assert!(watch.is_empty());
    }

    #[test]
    fn dropped_target_reports_unknown() {
        let watch = DeathWatch::new();
        let (w, watcher) = recorder();
        let (t, target) = recorder();
        drop(t);

        watch.monitor(&watcher, &target);
        assert_eq!(w.downs()[0].reason, ExitReason::Unknown);
    }

    #[test]
    fn reaped_target_reports_its_recorded_reason() {
        let watch = DeathWatch::new();
        let (w, watcher) = recorder();
        let record = Arc::new(ExitRecord::new());
        let (t, _) = recorder();
        let weak: WeakChannel = Arc::downgrade(&t) as WeakChannel;
        let target = Address::with_exit_record(next_actor_id(), weak, record.clone());

        record.record(ExitReason::abnormal("gone"));
        drop(t);

        watch.monitor(&watcher, &target);
        assert_eq!(w.downs()[0].reason, ExitReason::abnormal("gone"));
        assert!(watch.is_empty());
    }

    #[test]
    fn dead_watcher_is_not_registered() {
        let watch = DeathWatch::new();
        let (w, watcher) = recorder();
        let (_t, target) = recorder();
        w.kill(ExitReason::Normal);

        watch.monitor(&watcher, &target);
        assert!(!watch.is_monitoring(&watcher, &target));
        assert!(watch.is_empty());
        assert!(w.downs().is_empty());
    }

    #[test]
    fn demonitor_cancels_notification() {
        let watch = DeathWatch::new();
        let (w, watcher) = recorder();
        let (t, target) = recorder();

        watch.monitor(&watcher, &target);
        assert!(watch.demonitor(&watcher, &target));
        assert!(!watch.demonitor(&watcher, &target));
        terminate(&watch, &t, &target, ExitReason::Normal);

        assert!(w.downs().is_empty());
        assert!(watch.is_empty());
    }

    #[test]
    fn terminated_watcher_is_forgotten() {
        let watch = DeathWatch::new();
        let (w, watcher) = recorder();
        let (_t, target) = recorder();

        watch.monitor(&watcher, &target);
        terminate(&watch, &w, &watcher, ExitReason::Normal);

        assert!(!watch.is_monitoring(&watcher, &target));
        assert!(watch.is_empty());
    }

    #[test]
    fn links_propagate_abnormal_exits_only() {
        let watch = DeathWatch::new();
        let (a_rec, a) = recorder();
        let (b_rec, b) = recorder();
        let (c_rec, c) = recorder();

        watch.link(&a, &b);
        watch.link(&a, &c);
        assert!(watch.is_linked(&b, &a));

        terminate(&watch, &b_rec, &b, ExitReason::Normal);
        assert!(a_rec.signals().is_empty());

        terminate(&watch, &a_rec, &a, ExitReason::abnormal("boom"));
        let signals = c_rec.signals();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, a);
        assert_eq!(signals[0].reason, ExitReason::abnormal("boom"));
        assert!(watch.is_empty());
    }

    #[test]
    fn linking_to_a_dead_actor_signals_at_once() {
        let watch = DeathWatch::new();
        let (a_rec, a) = recorder();
        let (b_rec, b) = recorder();
        b_rec.kill(ExitReason::UserShutdown);

        watch.link(&a, &b);

        assert_eq!(a_rec.signals()[0].reason, ExitReason::UserShutdown);
        assert!(watch.is_empty());
    }

    #[test]
    fn unlink_removes_both_directions() {
        let watch = DeathWatch::new();
        let (a_rec, a) = recorder();
        let (b_rec, b) = recorder();

        watch.link(&a, &b);
        watch.unlink(&b, &a);
        assert!(watch.is_empty());

        terminate(&watch, &b_rec, &b, ExitReason::abnormal("late"));
        assert!(a_rec.signals().is_empty());
    }
}
