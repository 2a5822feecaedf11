//! # Scheduler Module
//!
//! The seam between the actor runtime and whatever executes actor run
//! loops. A scheduler receives one future per actor and must poll it to
//! completion; the run loop itself guarantees that an actor never handles
//! two messages concurrently.
//!
//! ## Implementations
//! - `SharedScheduler`: spawns the run loop as a task on a tokio runtime;
//!   a suspended synchronous send yields the worker thread to other actors
//! - `DedicatedScheduler`: one OS thread per actor, each driving its own
//!   current-thread tokio runtime

use std::fmt;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

use aviary_api::types::BoxedFuture;
use aviary_api::ActorId;

use crate::error::SpawnError;

/// Unit of work handed to a scheduler: one actor's complete run loop.
pub type ActorJob = BoxedFuture<'static, ()>;

/// Common interface for all scheduler implementations
pub trait Scheduler: fmt::Debug + Send + Sync {
    /// Start executing `job` for the actor `id`.
    fn schedule(&self, id: ActorId, job: ActorJob) -> Result<(), SpawnError>;
}

/// Runs actors as tasks on a shared tokio runtime.
#[derive(Debug, Clone)]
pub struct SharedScheduler {
    handle: Handle,
}

impl SharedScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for SharedScheduler {
    fn schedule(&self, id: ActorId, job: ActorJob) -> Result<(), SpawnError> {
        debug!(scheduler = "shared", actor = id, event = "scheduled");
        self.handle.spawn(job);
        Ok(())
    }
}

/// Runs every actor on its own named OS thread.
#[derive(Debug, Clone)]
pub struct DedicatedScheduler {
    thread_name_prefix: String,
}

impl DedicatedScheduler {
    pub fn new(system_name: &str) -> Self {
        Self {
            thread_name_prefix: format!("{}-actor-", system_name),
        }
    }
}

impl Scheduler for DedicatedScheduler {
    fn schedule(&self, id: ActorId, job: ActorJob) -> Result<(), SpawnError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SpawnError::ThreadSetup(e.to_string()))?;
        let runtime = RuntimeGuard(Some(runtime));
        let dispatch = crate::logging::current_subscriber();

        std::thread::Builder::new()
            .name(format!("{}{}", self.thread_name_prefix, id))
            .spawn(move || {
                let _guard = tracing::dispatcher::set_default(&dispatch);
                if let Some(runtime) = runtime.0.as_ref() {
                    runtime.block_on(job);
                }
            })
            .map_err(|e| SpawnError::ThreadSetup(e.to_string()))?;

        debug!(scheduler = "dedicated", actor = id, event = "scheduled");
        Ok(())
    }
}

// A runtime may be dropped on an async thread when the thread spawn fails,
// which tokio forbids for a blocking drop.
struct RuntimeGuard(Option<Runtime>);

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}
