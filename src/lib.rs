//! # procvisor
//!
//! **Procvisor** is a bounded-pool supervisor for external child processes.
//!
//! It launches children through a pluggable backend, enforces a concurrency
//! cap and a per-child age limit, streams their output while they run, and
//! drives a graceful-to-forceful signal escalation on shutdown or overrun.
//! The engine is cooperative: every lifecycle step happens inside the
//! caller's own `spawn` and `wait` calls, never on a background scanner.
//!
//! ## Features
//!
//! | Area             | Description                                                        | Key types / traits                  |
//! |------------------|--------------------------------------------------------------------|-------------------------------------|
//! | **Admission**    | Cap live children; `spawn` blocks until a reap frees a slot.       | [`Config::max_kids`]                |
//! | **Age limits**   | Escalate children that outlive their budget.                       | [`Config::timeout`], [`KillSequence`] |
//! | **Backends**     | Pluggable spawning adapters, selected by name.                     | [`Backend`], [`ChildHandle`]        |
//! | **Hooks**        | React to spawn/alive/reap on the supervisor's call path.           | [`Hooks`], [`LogHooks`]             |
//! | **Output**       | Non-blocking line framing over captured stdout/stderr.             | [`LineReader`], [`KidStreams`]      |
//! | **Signals**      | INT/TERM forwarded to every child, prior handlers restored.        | [`Supervisor::send_signal`]         |
//! | **Errors**       | Typed construction/spawn errors; hook failures logged, swallowed.  | [`RuntimeError`], [`HookError`]     |
//!
//! Unix only: the process layer speaks `kill`, `waitpid`, and `sigaction`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use procvisor::{Config, LogHooks, SpawnOptions, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.max_kids = 2;
//!     cfg.timeout = Duration::from_secs(60);
//!
//!     let mut sup = Supervisor::new(cfg, Arc::new(LogHooks))?;
//!
//!     for i in 0..5 {
//!         // Blocks while two children are already running.
//!         sup.spawn(
//!             ["sh", "-c", "sleep 1"],
//!             SpawnOptions::new().with_id(format!("worker-{i}")),
//!         )
//!         .await?;
//!     }
//!
//!     // Sweep until every child is reaped.
//!     assert!(sup.wait(None).await);
//!     Ok(())
//! }
//! ```

mod backend;
mod config;
mod error;
mod hooks;
mod kill;
mod reader;
mod registry;
mod signals;
mod supervisor;

// ---- Public re-exports ----

pub use backend::{Backend, ChildHandle, ExecBackend, KidRef, KidStreams, PgroupBackend, SpawnOptions};
pub use config::Config;
pub use error::{HookError, RuntimeError};
pub use hooks::{Hooks, LogHooks, NoopHooks, NO_ID};
pub use kill::{KillSequence, KillStep, KillTarget};
pub use reader::LineReader;
pub use registry::Kid;
pub use supervisor::Supervisor;

/// Signal type used throughout the public API (re-exported from `nix`).
pub use nix::sys::signal::Signal;
