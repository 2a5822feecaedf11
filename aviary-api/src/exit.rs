//! Exit reasons and the signals that carry them.

use std::fmt;
use std::sync::OnceLock;

use crate::address::Address;

/// Why an actor terminated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExitReason {
    /// Regular end of work.
    Normal,
    /// Termination requested by the application.
    UserShutdown,
    /// A behavior failed or panicked; carries the failure text.
    Abnormal(String),
    /// No reason is on record, e.g. for the `invalid` Address.
    Unknown,
}

impl ExitReason {
    pub fn abnormal(reason: impl fmt::Display) -> Self {
        ExitReason::Abnormal(reason.to_string())
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ExitReason::Normal)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::UserShutdown => write!(f, "user_shutdown"),
            ExitReason::Abnormal(reason) => write!(f, "abnormal: {}", reason),
            ExitReason::Unknown => write!(f, "unknown"),
        }
    }
}

/// Write-once slot for an actor's exit reason.
///
/// Shared by the actor cell and every Address pointing at it, so the reason
/// stays readable after the actor itself has been reaped.
#[derive(Debug, Default)]
pub struct ExitRecord {
    reason: OnceLock<ExitReason>,
}

impl ExitRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `reason`. Returns `false` if a reason was already recorded.
    pub fn record(&self, reason: ExitReason) -> bool {
        self.reason.set(reason).is_ok()
    }

    pub fn get(&self) -> Option<ExitReason> {
        self.reason.get().cloned()
    }

    pub fn is_recorded(&self) -> bool {
        self.reason.get().is_some()
    }
}

/// Priority instruction asking an actor to terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitSignal {
    /// Actor that requested the exit, `Address::invalid()` for anonymous senders.
    pub source: Address,
    pub reason: ExitReason,
}

impl ExitSignal {
    pub fn new(source: Address, reason: ExitReason) -> Self {
        Self { source, reason }
    }
}
