//! # Process-wide INT/TERM forwarding to supervised children.
//!
//! Installing a supervisor mutates global handler slots: the prior SIGINT and
//! SIGTERM dispositions are snapshotted at construction and restored when the
//! [`SignalGuard`] is dropped. In between, a received INT or TERM is forwarded
//! to every registered child pid, then re-raised with the default disposition
//! so the process still dies per policy.
//!
//! ## Rules
//! - The handler body is async-signal-safe: it touches only a fixed table of
//!   atomics and calls `kill`, `signal(SIG_DFL)`, and `raise`.
//! - The pid table is maintained at spawn/reap time, outside the handler.
//! - Nested supervisors are not supported; the last guard to install wins and
//!   the first to drop restores.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::warn;

use crate::error::RuntimeError;

const TABLE_SLOTS: usize = 1024;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicI32 = AtomicI32::new(0);

/// Pids the handler forwards to. Zero marks a free slot.
static FORWARD_TABLE: [AtomicI32; TABLE_SLOTS] = [EMPTY_SLOT; TABLE_SLOTS];

/// Registers a pid for forwarding. Called at spawn.
pub(crate) fn track(pid: i32) {
    for slot in FORWARD_TABLE.iter() {
        if slot
            .compare_exchange(0, pid, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            return;
        }
    }
    warn!(pid, "signal forward table full; child will not receive broadcast signals");
}

/// Unregisters a pid. Called at reap.
pub(crate) fn untrack(pid: i32) {
    for slot in FORWARD_TABLE.iter() {
        let _ = slot.compare_exchange(pid, 0, Ordering::AcqRel, Ordering::Relaxed);
    }
}

extern "C" fn forward_to_kids(sig: libc::c_int) {
    for slot in FORWARD_TABLE.iter() {
        let pid = slot.load(Ordering::Relaxed);
        if pid > 0 {
            unsafe {
                libc::kill(pid, sig);
            }
        }
    }
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
        libc::raise(sig);
    }
}

/// Snapshot of the prior INT/TERM dispositions; restores them on drop.
pub(crate) struct SignalGuard {
    prev_int: SigAction,
    prev_term: SigAction,
}

impl SignalGuard {
    /// Installs the forwarder for SIGINT and SIGTERM, capturing what was
    /// there before.
    pub(crate) fn install() -> Result<Self, RuntimeError> {
        let forward = SigAction::new(
            SigHandler::Handler(forward_to_kids),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        let prev_int = unsafe { sigaction(Signal::SIGINT, &forward) }
            .map_err(|source| RuntimeError::SignalInstall { source })?;
        let prev_term = match unsafe { sigaction(Signal::SIGTERM, &forward) } {
            Ok(prev) => prev,
            Err(source) => {
                // Half-installed is worse than not installed.
                let _ = unsafe { sigaction(Signal::SIGINT, &prev_int) };
                return Err(RuntimeError::SignalInstall { source });
            }
        };
        Ok(Self { prev_int, prev_term })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        let _ = unsafe { sigaction(Signal::SIGINT, &self.prev_int) };
        let _ = unsafe { sigaction(Signal::SIGTERM, &self.prev_term) };
    }
}
