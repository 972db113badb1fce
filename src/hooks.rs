//! # Lifecycle hooks invoked on the supervisor's call path.
//!
//! [`Hooks`] is the extension point for reacting to child lifecycle:
//! `on_spawn` right after a successful start, `while_alive` for each
//! still-running child during a sweep, and `on_reap` right after removal
//! from the registry (before the handle is closed and the zombie collected).
//!
//! ## Rules
//! - Hooks run serially on the supervisor's call path, never concurrently
//!   with a reap of the same child. A hook that blocks stalls admission,
//!   reaping, and the age-killer.
//! - Errors and panics are caught, logged with the child id, and swallowed:
//!   a crashing hook must not abandon zombies or leak admission slots.
//! - Ordering per child: `on_spawn` precedes any `while_alive`, which
//!   precedes `on_reap`.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::warn;

use crate::error::HookError;
use crate::registry::Kid;

/// Placeholder used in logs for children spawned without a label.
pub const NO_ID: &str = "[no ID provided]";

/// Hook into child lifecycle events.
///
/// All methods default to no-ops; implement the ones you need.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use procvisor::{HookError, Hooks, Kid};
///
/// struct OutputPump;
///
/// #[async_trait]
/// impl Hooks for OutputPump {
///     async fn while_alive(&self, kid: &Kid) -> Result<(), HookError> {
///         for line in kid.handle().streams().stdout_lines().map_err(|e| HookError::new(e.to_string()))? {
///             println!("{}: {line}", kid.id().unwrap_or("?"));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Invoked just after a successful spawn, before `spawn` returns.
    async fn on_spawn(&self, _kid: &Kid) -> Result<(), HookError> {
        Ok(())
    }

    /// Invoked just after removal from the registry, before the handle is
    /// closed and the zombie collected. `count_kids` already reflects the
    /// post-reap count.
    async fn on_reap(&self, _kid: &Kid) -> Result<(), HookError> {
        Ok(())
    }

    /// Invoked during sweeps for each child that is still running.
    async fn while_alive(&self, _kid: &Kid) -> Result<(), HookError> {
        Ok(())
    }
}

/// The empty hook set.
pub struct NoopHooks;

impl Hooks for NoopHooks {}

/// Simple stdout logging hooks for debugging and demos.
///
/// Not intended for production use; implement your own [`Hooks`] for
/// structured logging or metrics.
pub struct LogHooks;

#[async_trait]
impl Hooks for LogHooks {
    async fn on_spawn(&self, kid: &Kid) -> Result<(), HookError> {
        println!(
            "[spawned] pid={} id={} cmd={:?}",
            kid.pid(),
            kid.id().unwrap_or(NO_ID),
            kid.cmdline()
        );
        Ok(())
    }

    async fn on_reap(&self, kid: &Kid) -> Result<(), HookError> {
        println!("[reaped] pid={} id={}", kid.pid(), kid.id().unwrap_or(NO_ID));
        Ok(())
    }

    async fn while_alive(&self, kid: &Kid) -> Result<(), HookError> {
        println!(
            "[alive] pid={} id={} age={:?}",
            kid.pid(),
            kid.id().unwrap_or(NO_ID),
            kid.age()
        );
        Ok(())
    }
}

/// Runs one hook, catching errors and panics so the supervisor continues.
pub(crate) async fn run_guarded<F>(stage: &'static str, id: Option<&str>, hook: F)
where
    F: Future<Output = Result<(), HookError>>,
{
    let id = id.unwrap_or(NO_ID);
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(stage, id, error = %err, "hook failed; continuing"),
        Err(payload) => {
            let info = panic_message(payload.as_ref());
            warn!(stage, id, panic = info, "hook panicked; continuing");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
