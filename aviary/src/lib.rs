// Aviary actor runtime
//
// Actors with private state and FIFO mailboxes, synchronous sends with
// continuations, monitors and links, and worker pools behind a router.
// The data model lives in `aviary-api`; this crate runs it on tokio.

pub mod actor;
pub mod config;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod pool;
pub mod scheduler;
pub mod scoped;
pub mod system;
pub mod watch;

// Re-export commonly used types
pub use actor::{Behavior, Context, Continuation, Reply, RequestBuilder};
pub use aviary_api::*;
pub use config::{ActorConfig, SchedulingMode, SystemConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::{MailboxError, SpawnError, SystemError};
pub use pool::{make_pool, make_pool_with_policy, RoutingPolicy, RoutingPolicyKind};
pub use scoped::ScopedActor;
pub use system::ActorSystem;
pub use watch::DeathWatch;
