//! # Actor Pool
//!
//! A pool is a router actor in front of a dynamic set of workers. From the
//! outside it is an ordinary address: user messages sent to it are forwarded
//! to the workers the routing policy selects, with the original sender and
//! response channel intact, so workers reply straight to the requester.
//!
//! ## Membership
//! - `SysMessage::Put(worker)` adds a worker and starts monitoring it
//! - `SysMessage::Get` replies with a `Vec<Address>` snapshot of the workers
//! - a worker that terminates, for any reason, is removed when its
//!   down-notification arrives
//!
//! ## Shutdown
//! The router traps exits. On an exit signal it forwards the signal to every
//! worker and terminates with the same reason once the last worker's
//! down-notification has arrived. Watchers of the pool therefore see its
//! termination only after all of its workers are gone.
//!
//! ## Example
//!
//! ```rust,no_run
//! use aviary::{make_pool, ActorSystem, Behavior, Context, RoutingPolicyKind, SystemConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let system = ActorSystem::new(SystemConfig::default())?;
//! let pool = make_pool(
//!     &system,
//!     4,
//!     |system| {
//!         system.spawn(
//!             (),
//!             Behavior::new().respond(|_: &mut (), _: &mut Context<()>, n: &u64| Ok(n * 2)),
//!         )
//!     },
//!     RoutingPolicyKind::RoundRobin,
//! )?;
//! let doubled: u64 = system
//!     .request(&pool, 21u64, std::time::Duration::from_secs(1))
//!     .await?
//!     .value()?;
//! assert_eq!(doubled, 42);
//! # Ok(())
//! # }
//! ```

pub mod policy;

use tracing::warn;

use aviary_api::{
    ActorResult, Address, DownMsg, ExitMsg, ExitReason, Message, SysMessage,
};

use crate::actor::{Behavior, Context, Reply};
use crate::config::ActorConfig;
use crate::error::SpawnError;
use crate::log_pool;
use crate::system::ActorSystem;

pub use policy::{Broadcast, Random, RoundRobin, RoutingPolicy, RoutingPolicyKind};

/// Spawns `count` workers through `factory` and a router in front of them
/// using one of the built-in policies.
pub fn make_pool<F>(
    system: &ActorSystem,
    count: usize,
    factory: F,
    kind: RoutingPolicyKind,
) -> Result<Address, SpawnError>
where
    F: FnMut(&ActorSystem) -> Result<Address, SpawnError>,
{
    make_pool_with_policy(system, count, factory, kind.build())
}

/// Like [`make_pool`], with a caller-supplied routing policy.
///
/// If any worker fails to spawn, the workers spawned so far are stopped and
/// the error is returned.
pub fn make_pool_with_policy<F>(
    system: &ActorSystem,
    count: usize,
    mut factory: F,
    policy: Box<dyn RoutingPolicy>,
) -> Result<Address, SpawnError>
where
    F: FnMut(&ActorSystem) -> Result<Address, SpawnError>,
{
    let mut workers: Vec<Address> = Vec::with_capacity(count);
    for _ in 0..count {
        match factory(system) {
            Ok(worker) => {
                if !workers.contains(&worker) {
                    workers.push(worker);
                }
            }
            Err(err) => {
                release(system, &workers);
                return Err(err);
            }
        }
    }

    let config = ActorConfig::named("pool").with_trap_exit(true);
    let router = match system.spawn_with_config(config, Pool::new(workers.clone(), policy), router_behavior()) {
        Ok(router) => router,
        Err(err) => {
            release(system, &workers);
            return Err(err);
        }
    };

    for worker in &workers {
        system.monitor(&router, worker);
    }
    log_pool!(router, "created", workers = workers.len());
    Ok(router)
}

fn release(system: &ActorSystem, workers: &[Address]) {
    for worker in workers {
        system.send_exit(worker, ExitReason::UserShutdown);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Active,
    ShuttingDown(ExitReason),
}

/// Router state.
#[derive(Debug)]
struct Pool {
    workers: Vec<Address>,
    policy: Box<dyn RoutingPolicy>,
    phase: Phase,
}

impl Pool {
    fn new(workers: Vec<Address>, policy: Box<dyn RoutingPolicy>) -> Self {
        Self {
            workers,
            policy,
            phase: Phase::Active,
        }
    }

    fn put(&mut self, ctx: &mut Context<Pool>, worker: &Address) {
        if let Phase::ShuttingDown(_) = self.phase {
            warn!(pool = %ctx.address(), worker = %worker, "put ignored during shutdown");
            return;
        }
        if !worker.is_valid() || self.workers.contains(worker) {
            return;
        }
        ctx.monitor(worker);
        self.workers.push(worker.clone());
        log_pool!(ctx.address(), "worker_added", worker = %worker, workers = self.workers.len());
        // Messages that arrived while the pool was empty.
        ctx.replay_stash();
    }

    fn evict(&mut self, ctx: &mut Context<Pool>, down: &DownMsg) {
        let before = self.workers.len();
        self.workers.retain(|worker| worker != &down.source);
        if self.workers.len() < before {
            log_pool!(
                ctx.address(),
                "worker_removed",
                worker = %down.source,
                reason = %down.reason,
                workers = self.workers.len()
            );
        }
        if let Phase::ShuttingDown(reason) = &self.phase {
            if self.workers.is_empty() {
                ctx.quit(reason.clone());
            }
        }
    }

    fn begin_shutdown(&mut self, ctx: &mut Context<Pool>, exit: &ExitMsg) {
        if let Phase::ShuttingDown(_) = self.phase {
            return;
        }
        log_pool!(ctx.address(), "shutdown", reason = %exit.reason, workers = self.workers.len());
        if self.workers.is_empty() {
            ctx.quit(exit.reason.clone());
            return;
        }
        self.phase = Phase::ShuttingDown(exit.reason.clone());
        for worker in &self.workers {
            ctx.send_exit(worker, exit.reason.clone());
        }
    }

    fn route(&mut self, ctx: &mut Context<Pool>, message: &Message) -> Option<ActorResult<Reply>> {
        if !matches!(message, Message::User(_)) {
            return None;
        }
        if let Phase::ShuttingDown(_) = self.phase {
            log_pool!(ctx.address(), "dropped", message_type = message.tag());
            return Some(Ok(Reply::None));
        }
        if self.workers.is_empty() {
            // Declined: stays stashed until a worker is put.
            return None;
        }
        for worker in self.policy.select(&self.workers, message) {
            ctx.forward(&worker, message.clone());
        }
        Some(Ok(Reply::None))
    }
}

fn router_behavior() -> Behavior<Pool> {
    Behavior::new()
        .on_exit(|pool: &mut Pool, ctx: &mut Context<Pool>, exit: &ExitMsg| {
            pool.begin_shutdown(ctx, exit);
            Ok(())
        })
        .on_down(|pool: &mut Pool, ctx: &mut Context<Pool>, down: &DownMsg| {
            pool.evict(ctx, down);
            Ok(())
        })
        .on_sys(|pool: &mut Pool, ctx: &mut Context<Pool>, sys: &SysMessage| match sys {
            SysMessage::Put(worker) => {
                pool.put(ctx, worker);
                Ok(Reply::None)
            }
            SysMessage::Get => Ok(Reply::value(pool.workers.clone())),
        })
        .on_message(|pool: &mut Pool, ctx: &mut Context<Pool>, message: &Message| {
            pool.route(ctx, message)
        })
        .before_stop(|pool: &mut Pool, ctx: &mut Context<Pool>, reason: &ExitReason| {
            // Only non-empty when the router dies without a shutdown cascade.
            for worker in pool.workers.drain(..) {
                ctx.send_exit(&worker, reason.clone());
            }
        })
}
