//! # Signal escalation applied to one child until it exits.
//!
//! A [`KillSequence`] is an ordered list of `(signal, wait)` steps. For each
//! step the executor checks liveness, sends the signal, then polls once per
//! second up to the step's wait. Total wall time is bounded by the sum of the
//! waits; a child that survives the whole sequence is left for later sweeps
//! or the final TERM broadcast.
//!
//! ## Example
//! ```
//! use procvisor::KillSequence;
//! use std::time::Duration;
//!
//! let seq = KillSequence::default();
//! assert_eq!(seq.steps().len(), 6);
//! assert_eq!(seq.total_wait(), Duration::from_secs(28));
//! ```

use std::time::Duration;

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use tracing::debug;

use crate::backend::ChildHandle;

/// One escalation step: send `signal`, then poll liveness for up to `wait`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KillStep {
    /// Signal delivered to the child (or its group).
    pub signal: Signal,
    /// Poll window after delivery, in whole seconds.
    pub wait: Duration,
}

impl KillStep {
    /// Creates a step from a signal and a wait in seconds.
    pub fn new(signal: Signal, wait_secs: u64) -> Self {
        Self {
            signal,
            wait: Duration::from_secs(wait_secs),
        }
    }
}

/// Where the escalation signals are aimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillTarget {
    /// The child process itself.
    Process,
    /// The child's whole process group (`killpg`).
    Group,
}

/// Ordered escalation from polite to unrefusable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KillSequence {
    steps: Vec<KillStep>,
}

impl Default for KillSequence {
    /// The standard escalation: `INT/3, INT/5, TERM/2, TERM/8, KILL/3, KILL/7`.
    fn default() -> Self {
        Self {
            steps: vec![
                KillStep::new(Signal::SIGINT, 3),
                KillStep::new(Signal::SIGINT, 5),
                KillStep::new(Signal::SIGTERM, 2),
                KillStep::new(Signal::SIGTERM, 8),
                KillStep::new(Signal::SIGKILL, 3),
                KillStep::new(Signal::SIGKILL, 7),
            ],
        }
    }
}

impl KillSequence {
    /// Creates a sequence from explicit steps.
    pub fn new(steps: Vec<KillStep>) -> Self {
        Self { steps }
    }

    /// Returns the steps in escalation order.
    pub fn steps(&self) -> &[KillStep] {
        &self.steps
    }

    /// Sum of all per-step waits; the executor's wall-time bound.
    pub fn total_wait(&self) -> Duration {
        self.steps.iter().map(|s| s.wait).sum()
    }

    /// Runs the escalation against one child until it exits or the sequence
    /// is exhausted. Returns the child's terminated state at the end.
    pub async fn escalate(&self, child: &dyn ChildHandle, target: KillTarget) -> bool {
        let pid = Pid::from_raw(child.pid());
        for step in &self.steps {
            if child.is_terminated().await {
                return true;
            }
            let sent = match target {
                KillTarget::Process => kill(pid, step.signal),
                KillTarget::Group => killpg(pid, step.signal),
            };
            if let Err(errno) = sent {
                // ESRCH here means the child beat us to the exit; the next
                // liveness check confirms it.
                debug!(pid = child.pid(), signal = %step.signal, %errno, "kill failed");
            }
            for _ in 0..step.wait.as_secs() {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if child.is_terminated().await {
                    return true;
                }
            }
        }
        child.is_terminated().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, ExecBackend, SpawnOptions};
    use nix::sys::wait::waitpid;

    #[test]
    fn default_sequence_shape() {
        let seq = KillSequence::default();
        let signals: Vec<Signal> = seq.steps().iter().map(|s| s.signal).collect();
        assert_eq!(
            signals,
            vec![
                Signal::SIGINT,
                Signal::SIGINT,
                Signal::SIGTERM,
                Signal::SIGTERM,
                Signal::SIGKILL,
                Signal::SIGKILL,
            ]
        );
        assert_eq!(seq.total_wait(), Duration::from_secs(28));
    }

    #[tokio::test]
    async fn escalation_terminates_a_real_child() {
        let backend = ExecBackend;
        let kid = backend
            .start(&["sleep".into(), "30".into()], &SpawnOptions::default())
            .await
            .expect("spawn sleep");

        let seq = KillSequence::new(vec![KillStep::new(Signal::SIGKILL, 2)]);
        assert!(seq.escalate(kid.as_ref(), KillTarget::Process).await);

        kid.close().await;
        let _ = waitpid(Pid::from_raw(kid.pid()), None);
    }
}
