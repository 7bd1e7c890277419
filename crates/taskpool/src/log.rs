//! Logging
//!
//! The pool reports invalid configuration, task panics and lifecycle
//! transitions through a [`LogSink`]. The default sink forwards to `tracing`.

use std::fmt;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Get severity name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Destination for pool log messages
///
/// Called from worker threads as well as from the caller's thread, so
/// implementations must be thread-safe.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, severity: Severity);
}

/// Forwards messages to the `tracing` macros under the `taskpool` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => tracing::error!(target: "taskpool", "{}", message),
            Severity::Warning => tracing::warn!(target: "taskpool", "{}", message),
            Severity::Info => tracing::info!(target: "taskpool", "{}", message),
            Severity::Debug => tracing::debug!(target: "taskpool", "{}", message),
            Severity::Trace => tracing::trace!(target: "taskpool", "{}", message),
        }
    }
}
