use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where an actor's run loop executes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulingMode {
    /// Actor runs as a task on the system's shared tokio runtime.
    Shared,
    /// Actor runs exclusively on its own system thread.
    DedicatedThread,
}

#[derive(Clone, Debug)]
pub struct SystemConfig {
    /// Name used in logs and dedicated thread names.
    pub name: String,

    /// Used by `ScopedActor::ask`.
    pub default_request_timeout: Duration,

    pub default_scheduling_mode: SchedulingMode,

    /// How long `shutdown` waits for actors to terminate.
    pub shutdown_timeout: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "aviary".to_string(),
            default_request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_scheduling_mode: SchedulingMode::Shared,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl SystemConfig {
    /// Fills the fields `actor_config` leaves unset from the system defaults.
    pub fn merge_with_actor_config(&self, actor_config: &ActorConfig) -> ActorConfig {
        ActorConfig {
            name: actor_config.name.clone(),
            scheduling_mode: actor_config
                .scheduling_mode
                .clone()
                .or_else(|| Some(self.default_scheduling_mode.clone())),
            trap_exit: actor_config.trap_exit,
        }
    }
}

/// Per-actor overrides; unset fields fall back to [`SystemConfig`].
#[derive(Clone, Debug, Default)]
pub struct ActorConfig {
    /// Optional name, used only for logging.
    pub name: Option<String>,

    /// The scheduling mode for this actor.
    pub scheduling_mode: Option<SchedulingMode>,

    /// Receive exit signals as `Message::Exit` instead of terminating.
    pub trap_exit: bool,
}

impl ActorConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_trap_exit(mut self, trap_exit: bool) -> Self {
        self.trap_exit = trap_exit;
        self
    }

    pub fn with_scheduling_mode(mut self, mode: SchedulingMode) -> Self {
        self.scheduling_mode = Some(mode);
        self
    }
}
