//! # Backend adapters: a uniform view over process spawning.
//!
//! The supervisor core never touches `std::process` directly; it speaks to a
//! [`Backend`] that starts children and hands back a [`ChildHandle`], an
//! opaque capability set over one child: pid, non-blocking liveness, close,
//! optional native termination, and captured output streams.
//!
//! ## Adapters
//! - [`ExecBackend`] (`"exec"`): full-featured. `close` detaches the OS handle
//!   without waiting; termination is the supervisor's kill sequence.
//! - [`PgroupBackend`] (`"pgroup"`): children lead their own process group.
//!   `terminate` escalates against the whole group via `killpg`, and `close`
//!   waits (bounded) for exit before releasing the handle.
//!
//! ## Rules
//! - `start` must not block on child completion.
//! - `is_terminated` is a non-blocking poll and is stable once true.
//! - `close` is idempotent from the supervisor's perspective.
//! - Selection is by name at construction; an unknown name is
//!   [`RuntimeError::BackendNotFound`].

mod exec;
mod pgroup;

pub use exec::ExecBackend;
pub use pgroup::PgroupBackend;

use std::collections::HashMap;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::reader::LineReader;

/// Shared handle to a running (or already-exited, not-yet-reaped) child.
pub type KidRef = Arc<dyn ChildHandle>;

/// Per-spawn options passed through to the backend.
///
/// This is the supervisor's "extra" mapping made concrete: environment
/// overrides and a working directory, plus the user-facing label surfaced
/// to hooks.
#[derive(Clone, Debug, Default)]
pub struct SpawnOptions {
    /// Optional label surfaced to hooks; children without one are logged
    /// as `"[no ID provided]"`.
    pub id: Option<String>,
    /// Environment variables set on top of the inherited environment.
    pub env: HashMap<String, String>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
}

impl SpawnOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a label.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds one environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// A process-spawning adapter.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The name this adapter resolves under.
    fn name(&self) -> &'static str;

    /// Spawns the child. Must return as soon as the child is running.
    async fn start(
        &self,
        cmdline: &[String],
        opts: &SpawnOptions,
    ) -> Result<KidRef, RuntimeError>;
}

/// Capability set over one spawned child.
#[async_trait]
pub trait ChildHandle: Send + Sync {
    /// Operating-system process id.
    fn pid(&self) -> i32;

    /// Non-blocking liveness poll; stable once it has returned true.
    async fn is_terminated(&self) -> bool;

    /// Releases backend-side resources. Idempotent.
    async fn close(&self);

    /// Backend-native escalation toward exit.
    ///
    /// Returns false when the backend has no preferred termination, in which
    /// case the supervisor applies its own kill sequence.
    async fn terminate(&self) -> bool {
        false
    }

    /// Captured output streams, for use from hooks.
    fn streams(&self) -> &KidStreams;
}

impl std::fmt::Debug for dyn ChildHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildHandle").field("pid", &self.pid()).finish()
    }
}

/// Resolves the adapter named in the config.
pub(crate) fn resolve(cfg: &Config) -> Result<Arc<dyn Backend>, RuntimeError> {
    match cfg.backend.as_str() {
        ExecBackend::NAME => Ok(Arc::new(ExecBackend)),
        PgroupBackend::NAME => Ok(Arc::new(PgroupBackend::new(
            cfg.kill_sequence.clone(),
            cfg.grace,
        ))),
        other => Err(RuntimeError::BackendNotFound {
            name: other.to_string(),
        }),
    }
}

/// Builds the common command: args, env overrides, cwd, piped output.
pub(crate) fn build_command(cmdline: &[String], opts: &SpawnOptions) -> Command {
    let mut cmd = Command::new(&cmdline[0]);
    cmd.args(&cmdline[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &opts.env {
        cmd.env(key, value);
    }
    if let Some(dir) = &opts.cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// Child liveness bookkeeping shared by both adapters.
///
/// `try_wait` collects the zombie on success; the supervisor's own `waitpid`
/// afterwards is tolerated to fail with ECHILD.
pub(crate) struct ChildState {
    child: Option<Child>,
    status: Option<ExitStatus>,
}

impl ChildState {
    pub(crate) fn new(child: Child) -> Self {
        Self {
            child: Some(child),
            status: None,
        }
    }

    pub(crate) fn poll_terminated(&mut self) -> bool {
        if self.status.is_some() {
            return true;
        }
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    self.status = Some(status);
                    true
                }
                Ok(None) => false,
                // ECHILD: the child was collected elsewhere (signal path);
                // nothing left to observe.
                Err(_) => true,
            },
            None => true,
        }
    }

    pub(crate) fn detach(&mut self) {
        self.child = None;
    }
}

/// Captured stdout/stderr of one child, framed into lines.
///
/// Owns the carry-over buffers; they are released when the handle is closed.
pub struct KidStreams {
    stdout: Mutex<Option<LineReader<ChildStdout>>>,
    stderr: Mutex<Option<LineReader<ChildStderr>>>,
}

impl KidStreams {
    /// Takes the child's piped stdout/stderr, switches them to non-blocking
    /// mode, and wraps each in a [`LineReader`].
    pub(crate) fn capture(child: &mut Child) -> io::Result<Self> {
        let stdout = child
            .stdout
            .take()
            .map(|s| {
                set_nonblocking(s.as_raw_fd())?;
                Ok::<_, io::Error>(LineReader::new(s))
            })
            .transpose()?;
        let stderr = child
            .stderr
            .take()
            .map(|s| {
                set_nonblocking(s.as_raw_fd())?;
                Ok::<_, io::Error>(LineReader::new(s))
            })
            .transpose()?;
        Ok(Self {
            stdout: Mutex::new(stdout),
            stderr: Mutex::new(stderr),
        })
    }

    /// A stream set with nothing captured. Useful for stub handles.
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self {
            stdout: Mutex::new(None),
            stderr: Mutex::new(None),
        }
    }

    /// Completed lines currently available on stdout.
    pub fn stdout_lines(&self) -> io::Result<Vec<String>> {
        Self::drain(&self.stdout)
    }

    /// Completed lines currently available on stderr.
    pub fn stderr_lines(&self) -> io::Result<Vec<String>> {
        Self::drain(&self.stderr)
    }

    fn drain<R: Read>(slot: &Mutex<Option<LineReader<R>>>) -> io::Result<Vec<String>> {
        let mut guard = slot
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "stream lock poisoned"))?;
        match guard.as_mut() {
            Some(reader) => reader.read_lines(),
            None => Ok(Vec::new()),
        }
    }

    /// Drops both readers and their carry buffers.
    pub(crate) fn release(&self) {
        if let Ok(mut guard) = self.stdout.lock() {
            guard.take();
        }
        if let Ok(mut guard) = self.stderr.lock() {
            guard.take();
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
