//! # Process-group adapter.
//!
//! Children are spawned as leaders of their own process group, so an
//! escalation reaches the whole tree (`killpg`), not just the direct child.
//! `close` waits for the child to exit, bounded by the configured grace,
//! before releasing the handle.

use std::os::unix::process::CommandExt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{build_command, Backend, ChildHandle, ChildState, KidRef, KidStreams, SpawnOptions};
use crate::error::RuntimeError;
use crate::kill::{KillSequence, KillTarget};

/// The `"pgroup"` adapter.
pub struct PgroupBackend {
    sequence: KillSequence,
    grace: Duration,
}

impl PgroupBackend {
    /// Name this adapter resolves under.
    pub const NAME: &'static str = "pgroup";

    pub(crate) fn new(sequence: KillSequence, grace: Duration) -> Self {
        Self { sequence, grace }
    }
}

#[async_trait]
impl Backend for PgroupBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn start(
        &self,
        cmdline: &[String],
        opts: &SpawnOptions,
    ) -> Result<KidRef, RuntimeError> {
        let mut cmd = build_command(cmdline, opts);
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(|source| RuntimeError::SpawnFailed {
            program: cmdline[0].clone(),
            source,
        })?;
        let pid = child.id() as i32;
        let streams =
            KidStreams::capture(&mut child).map_err(|source| RuntimeError::SpawnFailed {
                program: cmdline[0].clone(),
                source,
            })?;
        Ok(Arc::new(PgroupChild {
            pid,
            state: Mutex::new(ChildState::new(child)),
            streams,
            sequence: self.sequence.clone(),
            grace: self.grace,
        }))
    }
}

struct PgroupChild {
    pid: i32,
    state: Mutex<ChildState>,
    streams: KidStreams,
    sequence: KillSequence,
    grace: Duration,
}

#[async_trait]
impl ChildHandle for PgroupChild {
    fn pid(&self) -> i32 {
        self.pid
    }

    async fn is_terminated(&self) -> bool {
        self.state.lock().await.poll_terminated()
    }

    /// Bounded wait for exit, then release.
    async fn close(&self) {
        for _ in 0..self.grace.as_secs() {
            if self.is_terminated().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        self.state.lock().await.detach();
        self.streams.release();
    }

    /// Escalates against the whole group; this adapter owns its termination.
    async fn terminate(&self) -> bool {
        self.sequence.escalate(self, KillTarget::Group).await;
        true
    }

    fn streams(&self) -> &KidStreams {
        &self.streams
    }
}
