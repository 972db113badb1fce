//! # Example: bounded_pool
//!
//! Five shell workers through a pool capped at two, with a 30-second age
//! limit as a safety net.
//!
//! Demonstrates how to:
//! - Configure admission (`max_kids`) and the age-killer (`timeout`).
//! - Attach [`LogHooks`] to watch spawn/alive/reap transitions.
//! - Drain everything with `wait(None)`.
//!
//! ## Run
//! ```bash
//! cargo run --example bounded_pool
//! ```

use std::sync::Arc;
use std::time::Duration;

use procvisor::{Config, LogHooks, SpawnOptions, Supervisor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // 1. Cap the pool at two children; escalate anything older than 30s.
    let mut cfg = Config::default();
    cfg.max_kids = 2;
    cfg.timeout = Duration::from_secs(30);
    cfg.debug = true;

    // 2. Create the supervisor with the built-in logging hooks.
    let mut sup = Supervisor::new(cfg, Arc::new(LogHooks))?;

    // 3. Spawn five workers; from the third on, spawn blocks until a reap
    //    frees a slot.
    for i in 0..5 {
        let script = format!("echo hello from worker {i}; sleep 1");
        sup.spawn(
            ["sh", "-c", script.as_str()],
            SpawnOptions::new().with_id(format!("worker-{i}")),
        )
        .await?;
        println!("pool now holds {} kid(s)", sup.count_kids());
    }

    // 4. Sweep until every worker is reaped.
    let all_done = sup.wait(None).await;
    println!("all reaped: {all_done}");
    Ok(())
}
