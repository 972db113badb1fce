//! # Global runtime configuration.
//!
//! [`Config`] defines the supervisor's behavior: pool size, per-child age limit,
//! backend selection, scan cadence, handle-close grace, and the kill sequence
//! used to escalate termination.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use procvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.max_kids = 4;
//! cfg.timeout = Duration::from_secs(60);
//!
//! assert_eq!(cfg.max_kids, 4);
//! assert_eq!(cfg.backend, "exec");
//! ```

use std::time::Duration;

use crate::kill::KillSequence;

/// Global configuration for the supervisor.
///
/// Controls admission, age-killing, backend selection, and scan cadence.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of children alive at once (0 = unbounded).
    ///
    /// An unbounded pool is retained for compatibility but rarely useful:
    /// admission control is the point of this crate.
    pub max_kids: usize,
    /// Per-child age limit; children older than this are escalated toward
    /// exit during sweeps (0 = no age limit).
    pub timeout: Duration,
    /// Backend adapter name, resolved at construction.
    ///
    /// Known adapters: `"exec"` and `"pgroup"`.
    pub backend: String,
    /// Sleep between sweeps while blocked in admission or `wait`.
    pub scan_interval: Duration,
    /// How long the `pgroup` backend waits for exit inside `close` before
    /// releasing the handle.
    pub grace: Duration,
    /// Signal escalation applied to over-age children.
    pub kill_sequence: KillSequence,
    /// Emit diagnostics on significant transitions (spawn, admission block,
    /// age-kill, reap, broadcast).
    pub debug: bool,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `max_kids = 0` (unbounded)
    /// - `timeout = 0s` (no age limit)
    /// - `backend = "exec"`
    /// - `scan_interval = 1s`
    /// - `grace = 10s`
    /// - `kill_sequence = KillSequence::default()`
    /// - `debug = false`
    fn default() -> Self {
        Self {
            max_kids: 0,
            timeout: Duration::ZERO,
            backend: "exec".to_string(),
            scan_interval: Duration::from_secs(1),
            grace: Duration::from_secs(10),
            kill_sequence: KillSequence::default(),
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.max_kids, 0);
        assert!(cfg.timeout.is_zero());
        assert_eq!(cfg.backend, "exec");
        assert_eq!(cfg.scan_interval, Duration::from_secs(1));
        assert!(!cfg.debug);
    }
}
