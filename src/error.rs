//! # Error types used by the procvisor runtime and user hooks.
//!
//! This module defines two main error types:
//!
//! - [`RuntimeError`] errors raised by the supervisor itself (construction and spawning).
//! - [`HookError`] errors raised by user callbacks; these are caught and logged,
//!   never propagated (see [`Hooks`](crate::Hooks)).
//!
//! [`RuntimeError`] provides `as_label()` returning a short stable string for logs/metrics.

use thiserror::Error;

/// # Errors produced by the supervisor runtime.
///
/// These represent failures in construction or spawning. A failed `spawn`
/// leaves the registry untouched; a failed construction leaves process-wide
/// signal dispositions untouched.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Constructor was given a backend name with no registered adapter.
    #[error("no backend adapter registered under '{name}'")]
    BackendNotFound {
        /// The unrecognized backend name.
        name: String,
    },

    /// The backend could not launch the child.
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        /// The program that failed to launch (first element of the command line).
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// `spawn` was called with an empty command line.
    #[error("command line must contain at least the program name")]
    EmptyCmdline,

    /// Installing the INT/TERM forwarder failed at construction.
    #[error("failed to install signal handlers: {source}")]
    SignalInstall {
        /// Underlying errno from `sigaction`.
        #[source]
        source: nix::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::BackendNotFound { .. } => "runtime_backend_not_found",
            RuntimeError::SpawnFailed { .. } => "runtime_spawn_failed",
            RuntimeError::EmptyCmdline => "runtime_empty_cmdline",
            RuntimeError::SignalInstall { .. } => "runtime_signal_install",
        }
    }
}

/// # Error returned by user hooks.
///
/// A hook that fails must not abandon reaped zombies or leak admission slots,
/// so the supervisor catches these, logs them with the child id, and continues.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct HookError {
    /// Human-readable failure description.
    pub reason: String,
}

impl HookError {
    /// Creates a new hook error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<String> for HookError {
    fn from(reason: String) -> Self {
        Self { reason }
    }
}

impl From<&str> for HookError {
    fn from(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = RuntimeError::BackendNotFound {
            name: "nope".into(),
        };
        assert_eq!(err.as_label(), "runtime_backend_not_found");
        assert_eq!(RuntimeError::EmptyCmdline.as_label(), "runtime_empty_cmdline");
    }

    #[test]
    fn hook_error_from_str() {
        let err: HookError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
