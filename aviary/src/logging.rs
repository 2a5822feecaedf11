//! Tracing setup and the event macros used across the runtime.
//!
//! Nothing is printed until one of the `init*` functions installs a
//! subscriber. `RUST_LOG` directives are applied on top of the configured
//! level, so `RUST_LOG=aviary::pool=trace` works with every preset.
//!
//! ```rust
//! use aviary::logging::{self, LogConfig};
//!
//! logging::init(LogConfig {
//!     level: tracing::Level::DEBUG,
//!     target_filters: Some("aviary::watch=trace".to_string()),
//!     ..Default::default()
//! });
//! ```
//!
//! Events carry an `event` field naming what happened (`spawned`,
//! `terminated`, `exit_signal`, `worker_added`, ...) so they can be filtered
//! in JSON output.

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// One JSON object per event instead of human-readable lines.
    pub json_format: bool,
    pub show_file_line: bool,
    /// Thread names matter for dedicated-thread actors.
    pub show_thread_info: bool,
    pub show_time: bool,
    /// Write through the libtest capture instead of stdout.
    pub test_writer: bool,
    /// Extra directives, comma separated: `"aviary::pool=trace,aviary::watch=debug"`.
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            test_writer: false,
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

fn build_filter(config: &LogConfig) -> EnvFilter {
    let directives = config.target_filters.iter().flat_map(|filters| filters.split(','));
    directives.fold(
        EnvFilter::from_default_env().add_directive(config.level.into()),
        |filter, directive| match directive.trim().parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        },
    )
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let output = if config.json_format {
            fmt::layer().json().flatten_event(true).boxed()
        } else {
            let lines = fmt::layer()
                .with_ansi(!config.test_writer && atty::is(atty::Stream::Stdout))
                .with_file(config.show_file_line)
                .with_line_number(config.show_file_line)
                .with_thread_names(config.show_thread_info)
                .with_thread_ids(config.show_thread_info);
            match (config.show_time, config.test_writer) {
                (true, false) => lines.boxed(),
                (false, false) => lines.without_time().boxed(),
                (true, true) => lines.with_test_writer().boxed(),
                (false, true) => lines.without_time().with_test_writer().boxed(),
            }
        };
        install(tracing_subscriber::registry().with(build_filter(&config)).with(output));
    });
}

fn install<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    // Another subscriber may already be installed by the host application.
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("aviary: tracing subscriber not installed: {}", err);
    }
}

/// Debug output for the runtime, trace for pool routing.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("aviary=debug,aviary::pool=trace".to_string()),
        ..Default::default()
    });
}

/// JSON at info level.
pub fn init_production() {
    init(LogConfig {
        json_format: true,
        show_file_line: false,
        ..Default::default()
    });
}

/// Warnings and errors only, captured per test.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        show_thread_info: false,
        show_time: false,
        test_writer: true,
        ..Default::default()
    });
}

/// The dispatcher active on the calling thread. Dedicated actor threads
/// adopt it so their events reach the same subscriber.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|dispatch| dispatch.clone())
}

/// Span wrapping an actor's whole run loop.
///
/// ```rust
/// let span = aviary::actor_span!(42u64, name = "pool");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! actor_span {
    ($actor_id:expr) => {
        tracing::info_span!("actor", id = $actor_id)
    };
    ($actor_id:expr, $($fields:tt)*) => {
        tracing::info_span!("actor", id = $actor_id, $($fields)*)
    };
}

#[macro_export]
macro_rules! log_lifecycle {
    ($actor:expr, $event:expr) => {
        tracing::debug!(actor = %$actor, event = $event);
    };
    ($actor:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(actor = %$actor, event = $event, $($fields)*);
    };
}

/// Per-message dispatch outcome; trace level.
#[macro_export]
macro_rules! log_message {
    ($message_type:expr, $status:expr) => {
        tracing::trace!(message_type = $message_type, status = $status);
    };
    ($message_type:expr, $status:expr, $($fields:tt)*) => {
        tracing::trace!(message_type = $message_type, status = $status, $($fields)*);
    };
}

#[macro_export]
macro_rules! log_pool {
    ($pool:expr, $event:expr) => {
        tracing::debug!(pool = %$pool, event = $event);
    };
    ($pool:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(pool = %$pool, event = $event, $($fields)*);
    };
}

#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error);
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*);
    };
}
