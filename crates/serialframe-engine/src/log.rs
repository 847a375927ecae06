//! Injected log sink.
//!
//! The engine never writes to a global logger directly; every message goes
//! through the [`LogSink`] it was built with. [`TracingSink`] forwards to
//! `tracing`, so the usual subscriber setup still applies.

use tracing::Level;

/// Receiver for leveled engine messages.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(Level, &str) + Send + Sync,
{
    fn log(&self, level: Level, message: &str) {
        self(level, message)
    }
}

/// Forwards every message to `tracing` under the `serialframe` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "serialframe", "{message}"),
            Level::WARN => tracing::warn!(target: "serialframe", "{message}"),
            Level::INFO => tracing::info!(target: "serialframe", "{message}"),
            Level::DEBUG => tracing::debug!(target: "serialframe", "{message}"),
            _ => tracing::trace!(target: "serialframe", "{message}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _message: &str) {}
}
