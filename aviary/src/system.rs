//! # Actor System
//!
//! Owns the scheduler, the registry of live actors and the death-watch
//! bookkeeping. Cloning an `ActorSystem` is cheap; all clones share the
//! same state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{info, warn, Instrument};

use aviary_api::{
    next_actor_id, ActorId, Address, Channel, Envelope, ExitReason, ExitSignal, Message,
    RequestError, Response, ResponsePromise,
};

use crate::actor::runner::ActorRunner;
use crate::actor::{ActorCell, Behavior, Context};
use crate::config::{ActorConfig, SchedulingMode, SystemConfig};
use crate::error::{SpawnError, SystemError};
use crate::mailbox;
use crate::scheduler::{ActorJob, DedicatedScheduler, Scheduler, SharedScheduler};
use crate::scoped::ScopedActor;
use crate::watch::DeathWatch;
use crate::{actor_span, log_error, log_lifecycle};

#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    config: SystemConfig,
    shared: SharedScheduler,
    dedicated: DedicatedScheduler,
    registry: RwLock<HashMap<ActorId, Arc<ActorCell>>>,
    watch: DeathWatch,
    running: watch::Sender<usize>,
    shutting_down: AtomicBool,
}

impl ActorSystem {
    /// Creates a system on the tokio runtime the caller is running on.
    pub fn new(config: SystemConfig) -> Result<Self, SystemError> {
        let handle = Handle::try_current().map_err(|_| SystemError::NoRuntime)?;
        Ok(Self::with_handle(config, handle))
    }

    pub fn with_handle(config: SystemConfig, handle: Handle) -> Self {
        let (running, _) = watch::channel(0);
        info!(system = %config.name, "actor system started");
        Self {
            inner: Arc::new(SystemInner {
                dedicated: DedicatedScheduler::new(&config.name),
                shared: SharedScheduler::new(handle),
                config,
                registry: RwLock::new(HashMap::new()),
                watch: DeathWatch::new(),
                running,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn death_watch(&self) -> &DeathWatch {
        &self.inner.watch
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    pub fn spawn<S: Send + 'static>(
        &self,
        state: S,
        behavior: Behavior<S>,
    ) -> Result<Address, SpawnError> {
        self.spawn_with_config(ActorConfig::default(), state, behavior)
    }

    pub fn spawn_with_config<S: Send + 'static>(
        &self,
        config: ActorConfig,
        state: S,
        behavior: Behavior<S>,
    ) -> Result<Address, SpawnError> {
        if self.is_shutting_down() {
            return Err(SpawnError::SystemShutdown);
        }
        let config = self.inner.config.merge_with_actor_config(&config);

        let id = next_actor_id();
        let (sender, receiver) = mailbox::channel();
        let cell = ActorCell::new(id, config.name.clone(), sender);
        let address = cell.address();
        let ctx = Context::new(address.clone(), self.clone(), config.trap_exit);
        let runner = ActorRunner::new(cell.clone(), state, behavior, ctx, receiver);

        self.inner.registry.write().insert(id, cell.clone());
        self.inner.running.send_modify(|count| *count += 1);

        let span = match config.name.as_deref() {
            Some(name) => actor_span!(id, name = name),
            None => actor_span!(id),
        };
        let job: ActorJob = Box::pin(runner.run().instrument(span));
        let scheduled = match config.scheduling_mode {
            Some(SchedulingMode::DedicatedThread) => self.inner.dedicated.schedule(id, job),
            _ => self.inner.shared.schedule(id, job),
        };

        if let Err(err) = scheduled {
            log_error!(err, actor = %address, "failed to schedule actor");
            cell.mark_terminated(ExitReason::abnormal(&err));
            self.forget(id);
            return Err(err);
        }
        // Lost the race against a concurrent shutdown's registry snapshot.
        if self.is_shutting_down() {
            cell.signal_exit(ExitSignal::new(Address::invalid(), ExitReason::UserShutdown));
        }

        log_lifecycle!(address, "spawned", name = ?config.name, mode = ?config.scheduling_mode);
        Ok(address)
    }

    /// An actor identity driven from ordinary async code.
    pub fn scoped_actor(&self) -> ScopedActor {
        ScopedActor::new(self.clone())
    }

    /// Sends without a sender; replies are dropped.
    pub fn send<T: Any + Send + Sync>(&self, target: &Address, value: T) -> bool {
        self.send_message(target, Message::user(value))
    }

    pub fn send_message(&self, target: &Address, message: Message) -> bool {
        target.enqueue(Envelope::new(Address::invalid(), message))
    }

    pub fn send_exit(&self, target: &Address, reason: ExitReason) -> bool {
        target.signal_exit(ExitSignal::new(Address::invalid(), reason))
    }

    /// Anonymous synchronous send.
    pub async fn request<T: Any + Send + Sync>(
        &self,
        target: &Address,
        value: T,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        self.request_message(target, Message::user(value), timeout)
            .await
    }

    pub async fn request_message(
        &self,
        target: &Address,
        message: Message,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        let (promise, handle) = ResponsePromise::channel();
        target.enqueue(Envelope::new(Address::invalid(), message).with_response(promise));
        handle.wait(timeout).await
    }

    pub fn monitor(&self, watcher: &Address, target: &Address) {
        self.inner.watch.monitor(watcher, target);
    }

    pub fn demonitor(&self, watcher: &Address, target: &Address) -> bool {
        self.inner.watch.demonitor(watcher, target)
    }

    pub fn link(&self, a: &Address, b: &Address) {
        self.inner.watch.link(a, b);
    }

    pub fn unlink(&self, a: &Address, b: &Address) {
        self.inner.watch.unlink(a, b);
    }

    /// Number of spawned actors that have not terminated yet.
    pub fn running_actors(&self) -> usize {
        *self.inner.running.borrow()
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.inner.registry.read().contains_key(&address.id())
    }

    /// Resolves once every spawned actor has terminated.
    pub async fn await_all_actors_done(&self) {
        let mut running = self.inner.running.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = running.wait_for(|count| *count == 0).await;
    }

    /// Sends `UserShutdown` to every live actor and waits for all of them,
    /// up to the configured shutdown timeout. Spawning fails from here on.
    pub async fn shutdown(&self) -> Result<(), SystemError> {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(SystemError::ShuttingDown);
        }
        let cells: Vec<Arc<ActorCell>> = self.inner.registry.read().values().cloned().collect();
        info!(system = %self.name(), actors = cells.len(), "shutting down");

        for cell in &cells {
            cell.signal_exit(ExitSignal::new(Address::invalid(), ExitReason::UserShutdown));
        }
        drop(cells);

        let timeout = self.inner.config.shutdown_timeout;
        match tokio::time::timeout(timeout, self.await_all_actors_done()).await {
            Ok(()) => {
                info!(system = %self.name(), "shutdown complete");
                Ok(())
            }
            Err(_) => {
                warn!(
                    system = %self.name(),
                    remaining = self.running_actors(),
                    "shutdown timed out"
                );
                Err(SystemError::ShutdownTimeout(timeout))
            }
        }
    }

    /// Final step of every termination, after the cell is marked terminated.
    pub(crate) fn on_actor_terminated(&self, address: &Address, reason: &ExitReason) {
        self.inner.watch.on_terminated(address, reason);
        self.forget(address.id());
    }

    fn forget(&self, id: ActorId) {
        let removed = self.inner.registry.write().remove(&id).is_some();
        if removed {
            self.inner.running.send_modify(|count| *count -= 1);
        }
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.inner.config.name)
            .field("running_actors", &self.running_actors())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
