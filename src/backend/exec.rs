//! # Full-featured adapter over `std::process`.
//!
//! `close` detaches the OS handle without waiting; escalation of a stubborn
//! child is the supervisor's job (this adapter has no native `terminate`).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{build_command, Backend, ChildHandle, ChildState, KidRef, KidStreams, SpawnOptions};
use crate::error::RuntimeError;

/// The `"exec"` adapter.
pub struct ExecBackend;

impl ExecBackend {
    /// Name this adapter resolves under.
    pub const NAME: &'static str = "exec";
}

#[async_trait]
impl Backend for ExecBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn start(
        &self,
        cmdline: &[String],
        opts: &SpawnOptions,
    ) -> Result<KidRef, RuntimeError> {
        let mut child =
            build_command(cmdline, opts)
                .spawn()
                .map_err(|source| RuntimeError::SpawnFailed {
                    program: cmdline[0].clone(),
                    source,
                })?;
        let pid = child.id() as i32;
        let streams =
            KidStreams::capture(&mut child).map_err(|source| RuntimeError::SpawnFailed {
                program: cmdline[0].clone(),
                source,
            })?;
        Ok(Arc::new(ExecChild {
            pid,
            state: Mutex::new(ChildState::new(child)),
            streams,
        }))
    }
}

struct ExecChild {
    pid: i32,
    state: Mutex<ChildState>,
    streams: KidStreams,
}

#[async_trait]
impl ChildHandle for ExecChild {
    fn pid(&self) -> i32 {
        self.pid
    }

    async fn is_terminated(&self) -> bool {
        self.state.lock().await.poll_terminated()
    }

    async fn close(&self) {
        self.state.lock().await.detach();
        self.streams.release();
    }

    fn streams(&self) -> &KidStreams {
        &self.streams
    }
}
