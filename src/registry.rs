//! # Child records and the pid-keyed registry.
//!
//! A [`Kid`] is the supervisor's per-child metadata: backend handle, optional
//! label, pid, timestamps, and the command line it was started with. The
//! [`Registry`] maps pid → record and answers the age queries the sweep's
//! age-killer runs on.
//!
//! ## Rules
//! - A record is present iff the child has been started and not yet reaped.
//! - `started_at` is set once at insertion and never mutated.
//! - The registry has a single owner (the supervisor); no lock is needed.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime};

use crate::backend::{KidRef, SpawnOptions};

/// Per-child record held from spawn to reap.
pub struct Kid {
    handle: KidRef,
    id: Option<String>,
    pid: i32,
    /// Wall-clock spawn time, for display.
    started_at: SystemTime,
    /// Monotonic spawn time, for age queries.
    spawned: Instant,
    cmdline: Vec<String>,
    opts: SpawnOptions,
}

impl Kid {
    pub(crate) fn new(handle: KidRef, cmdline: Vec<String>, opts: SpawnOptions) -> Self {
        Self {
            pid: handle.pid(),
            id: opts.id.clone(),
            started_at: SystemTime::now(),
            spawned: Instant::now(),
            handle,
            cmdline,
            opts,
        }
    }

    /// Backend handle for this child.
    pub fn handle(&self) -> &KidRef {
        &self.handle
    }

    /// User-supplied label, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Operating-system process id.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Wall-clock time of spawn.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Time since spawn.
    pub fn age(&self) -> Duration {
        self.spawned.elapsed()
    }

    /// The command line passed to the backend.
    pub fn cmdline(&self) -> &[String] {
        &self.cmdline
    }

    /// The options passed to the backend.
    pub fn options(&self) -> &SpawnOptions {
        &self.opts
    }
}

/// Pid-keyed map of live (or exited, not-yet-reaped) children.
#[derive(Default)]
pub(crate) struct Registry {
    kids: HashMap<i32, Kid>,
}

impl Registry {
    pub(crate) fn insert(&mut self, kid: Kid) {
        self.kids.insert(kid.pid(), kid);
    }

    pub(crate) fn get(&self, pid: i32) -> Option<&Kid> {
        self.kids.get(&pid)
    }

    pub(crate) fn remove(&mut self, pid: i32) -> Option<Kid> {
        self.kids.remove(&pid)
    }

    pub(crate) fn len(&self) -> usize {
        self.kids.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.kids.is_empty()
    }

    /// Snapshot of pids for iteration that survives reaps mid-sweep.
    pub(crate) fn pids(&self) -> Vec<i32> {
        self.kids.keys().copied().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Kid> {
        self.kids.values()
    }

    /// Pids of children whose age exceeds `limit`.
    pub(crate) fn older_than(&self, limit: Duration) -> Vec<i32> {
        self.kids
            .values()
            .filter(|kid| kid.age() > limit)
            .map(Kid::pid)
            .collect()
    }
}
