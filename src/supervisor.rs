//! # Supervisor: bounded pool of external child processes.
//!
//! The [`Supervisor`] owns the registry and drives every lifecycle step from
//! inside the caller's own calls: admission, scanning, age-killing, reaping,
//! and hook dispatch. There is no background scanner; progress happens when
//! the caller is inside `spawn` or `wait`.
//!
//! ## Architecture
//! ```text
//! caller ──► spawn(cmdline)
//!              ├─► sweep (reap finished, while_alive on the rest)
//!              ├─► admission: pool full? sleep + sweep until a reap frees a slot
//!              ├─► backend.start() ──► registry.insert + signal table
//!              └─► on_spawn hook ──► handle returned
//!
//! caller ──► wait(timeout?)
//!              └─► sweep + sleep until registry empty
//!                    └─► deadline passed? broadcast TERM, grace, final sweep
//!
//! sweep
//!   ├─► age-killer: terminate children older than cfg.timeout
//!   ├─► terminated child ──► reap: remove ► on_reap ► close ► waitpid
//!   └─► running child ──► while_alive hook
//! ```
//!
//! ## Rules
//! - The engine is single-owner (`&mut self`): no two logical operations run
//!   at once, and the registry needs no lock.
//! - Within one sweep, every reap notification precedes the sweep's return.
//! - A record leaves the registry *before* `on_reap` runs, so the hook sees
//!   the post-reap count and re-entrant sweeps cannot re-reap.
//! - Hook failures are logged and swallowed; see [`Hooks`].
//! - Dropping the supervisor restores the prior INT/TERM handlers but does
//!   not kill surviving children; that is the caller's job via `wait` or
//!   `send_signal`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use tokio::time;
use tracing::{debug, warn};

use crate::backend::{self, Backend, KidRef, SpawnOptions};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::hooks::{self, Hooks};
use crate::kill::KillTarget;
use crate::registry::{Kid, Registry};
use crate::signals::{self, SignalGuard};

/// Grace between the terminal TERM broadcast in `wait(timeout)` and its
/// final sweep.
const FINAL_TERM_GRACE: Duration = Duration::from_secs(5);

/// Manages a bounded pool of external child processes.
pub struct Supervisor {
    cfg: Config,
    backend: Arc<dyn Backend>,
    hooks: Arc<dyn Hooks>,
    registry: Registry,
    _signals: SignalGuard,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("cfg", &self.cfg)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Supervisor {
    /// Creates a supervisor: resolves the backend named in the config and
    /// installs the INT/TERM forwarder (prior handlers are snapshotted and
    /// restored on drop).
    ///
    /// Fails with [`RuntimeError::BackendNotFound`] for an unknown backend
    /// name, leaving process-wide state untouched.
    pub fn new(cfg: Config, hooks: Arc<dyn Hooks>) -> Result<Self, RuntimeError> {
        let backend = backend::resolve(&cfg)?;
        let guard = SignalGuard::install()?;
        Ok(Self {
            cfg,
            backend,
            hooks,
            registry: Registry::default(),
            _signals: guard,
        })
    }

    /// Starts one child, blocking while the pool is full.
    ///
    /// Runs one non-blocking sweep first. If `max_kids` is reached, it then
    /// sleeps and sweeps until a reap frees a slot. On success the child is
    /// registered, `on_spawn` has run, and the backend handle is returned.
    ///
    /// Either the record is in the registry and a handle is returned, or an
    /// error is returned and the registry is untouched.
    pub async fn spawn<I, S>(
        &mut self,
        cmdline: I,
        opts: SpawnOptions,
    ) -> Result<KidRef, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmdline: Vec<String> = cmdline.into_iter().map(Into::into).collect();
        if cmdline.is_empty() {
            return Err(RuntimeError::EmptyCmdline);
        }

        self.sweep(false).await;

        if self.cfg.max_kids > 0 {
            while self.registry.len() >= self.cfg.max_kids {
                if self.cfg.debug {
                    debug!(
                        kids = self.registry.len(),
                        max = self.cfg.max_kids,
                        "pool full; blocking admission"
                    );
                }
                time::sleep(self.cfg.scan_interval).await;
                if self.sweep(true).await {
                    break;
                }
            }
        }

        let handle = self.backend.start(&cmdline, &opts).await?;
        let kid = Kid::new(Arc::clone(&handle), cmdline, opts);
        let pid = kid.pid();
        signals::track(pid);
        self.registry.insert(kid);
        if self.cfg.debug {
            debug!(pid, backend = self.backend.name(), "child spawned");
        }

        if let Some(kid) = self.registry.get(pid) {
            hooks::run_guarded("on_spawn", kid.id(), self.hooks.on_spawn(kid)).await;
        }
        Ok(handle)
    }

    /// Sweeps until every child is reaped, or until `timeout` elapses.
    ///
    /// With no timeout, returns `true` once the registry is empty. With a
    /// timeout, a passed deadline triggers a TERM broadcast to all remaining
    /// pids, a five-second grace, and one final sweep; `false` means
    /// survivors remain in the registry for the caller to inspect.
    pub async fn wait(&mut self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|limit| Instant::now() + limit);
        loop {
            self.sweep(false).await;
            if self.registry.is_empty() {
                return true;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break;
                }
            }
            time::sleep(self.cfg.scan_interval).await;
        }

        if self.cfg.debug {
            debug!(
                kids = self.registry.len(),
                "wait deadline passed; broadcasting SIGTERM"
            );
        }
        self.send_signal(Signal::SIGTERM);
        time::sleep(FINAL_TERM_GRACE).await;
        self.sweep(false).await;
        self.registry.is_empty()
    }

    /// Sends `sig` to every pid currently in the registry.
    ///
    /// No state is mutated; reaping is left to the next sweep. A pid that is
    /// already gone is skipped silently.
    pub fn send_signal(&self, sig: Signal) {
        for kid in self.registry.iter() {
            if let Err(errno) = kill(Pid::from_raw(kid.pid()), sig) {
                if self.cfg.debug {
                    debug!(pid = kid.pid(), signal = %sig, %errno, "broadcast kill failed");
                }
            }
        }
    }

    /// Number of children currently in the registry.
    pub fn count_kids(&self) -> usize {
        self.registry.len()
    }

    /// Read-only view of the current records. Treat it as a snapshot;
    /// iteration order is unspecified.
    pub fn kids(&self) -> impl Iterator<Item = &Kid> {
        self.registry.iter()
    }

    /// One pass over the registry: run the age-killer, reap terminated
    /// children, invoke `while_alive` on the rest.
    ///
    /// With `stop_after_first_reap`, returns `true` immediately after the
    /// first reap; otherwise returns `false`.
    async fn sweep(&mut self, stop_after_first_reap: bool) -> bool {
        self.kill_overage().await;

        for pid in self.registry.pids() {
            let handle = match self.registry.get(pid) {
                Some(kid) => Arc::clone(kid.handle()),
                None => continue,
            };
            if handle.is_terminated().await {
                self.reap(pid).await;
                if stop_after_first_reap {
                    return true;
                }
            } else if let Some(kid) = self.registry.get(pid) {
                hooks::run_guarded("while_alive", kid.id(), self.hooks.while_alive(kid)).await;
            }
        }
        false
    }

    /// Escalates every child whose age exceeds the configured limit.
    ///
    /// Blocks for the duration of each escalation; admission latency under
    /// many simultaneously-aged children is bounded by the kill sequence.
    async fn kill_overage(&self) {
        if self.cfg.timeout.is_zero() {
            return;
        }
        for pid in self.registry.older_than(self.cfg.timeout) {
            let Some(kid) = self.registry.get(pid) else {
                continue;
            };
            if self.cfg.debug {
                debug!(pid, age = ?kid.age(), limit = ?self.cfg.timeout, "age limit exceeded; escalating");
            }
            let handle = Arc::clone(kid.handle());
            if !handle.terminate().await {
                self.cfg
                    .kill_sequence
                    .escalate(handle.as_ref(), KillTarget::Process)
                    .await;
            }
        }
    }

    /// Removes one terminated child: registry delete, `on_reap` hook,
    /// backend close, OS waitpid.
    async fn reap(&mut self, pid: i32) {
        let Some(kid) = self.registry.remove(pid) else {
            return;
        };
        signals::untrack(pid);
        if self.cfg.debug {
            debug!(pid, id = kid.id().unwrap_or(hooks::NO_ID), "reaping child");
        }

        hooks::run_guarded("on_reap", kid.id(), self.hooks.on_reap(&kid)).await;
        kid.handle().close().await;

        match waitpid(Pid::from_raw(pid), None) {
            Ok(_) => {}
            // Already collected by the backend's liveness poll or the signal
            // path; not an error.
            Err(Errno::ECHILD) => {}
            Err(errno) => warn!(pid, %errno, "waitpid failed"),
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // Survivors stay alive, but their pids must leave the global forward
        // table before the handlers are restored.
        for kid in self.registry.iter() {
            signals::untrack(kid.pid());
        }
    }
}
