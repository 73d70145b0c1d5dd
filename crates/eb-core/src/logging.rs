//! Logging infrastructure for the emotion-bridge crates

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system with an explicit maximum level.
pub fn init(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true),
        )
        .try_init();
}

/// Initialize logging with default settings (for tests and quick starts)
pub fn init_default() {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

// Convenience macros for bridge-specific logging

/// Log a GS-bridge trace message
#[macro_export]
macro_rules! gs_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "gs", $($arg)*)
    };
}

/// Log a GS-bridge debug message
#[macro_export]
macro_rules! gs_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "gs", $($arg)*)
    };
}
