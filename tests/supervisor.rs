//! Integration tests driving real children through the supervisor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use procvisor::{
    Config, HookError, Hooks, Kid, KillSequence, KillStep, NoopHooks, Signal, SpawnOptions,
    Supervisor,
};

/// Signal dispositions are process-wide; run supervisors one at a time.
static SEQ: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

#[derive(Default)]
struct Counters {
    spawned: AtomicUsize,
    reaped: AtomicUsize,
    alive_now: AtomicUsize,
    peak: AtomicUsize,
}

struct Tracking(Arc<Counters>);

#[async_trait]
impl Hooks for Tracking {
    async fn on_spawn(&self, _kid: &Kid) -> Result<(), HookError> {
        self.0.spawned.fetch_add(1, Ordering::SeqCst);
        let now = self.0.alive_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.peak.fetch_max(now, Ordering::SeqCst);
        Ok(())
    }

    async fn on_reap(&self, _kid: &Kid) -> Result<(), HookError> {
        self.0.reaped.fetch_add(1, Ordering::SeqCst);
        self.0.alive_now.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fast_cfg() -> Config {
    let mut cfg = Config::default();
    cfg.scan_interval = Duration::from_millis(100);
    cfg
}

#[tokio::test]
async fn bounded_pool_never_exceeds_cap() {
    let _guard = SEQ.lock().await;
    let counters = Arc::new(Counters::default());
    let mut cfg = fast_cfg();
    cfg.max_kids = 2;
    let mut sup = Supervisor::new(cfg, Arc::new(Tracking(Arc::clone(&counters)))).unwrap();

    for i in 0..5 {
        sup.spawn(["sleep", "1"], SpawnOptions::new().with_id(format!("kid-{i}")))
            .await
            .unwrap();
        assert!(sup.count_kids() <= 2);
    }
    assert!(sup.wait(None).await);

    assert_eq!(counters.spawned.load(Ordering::SeqCst), 5);
    assert_eq!(counters.reaped.load(Ordering::SeqCst), 5);
    assert!(counters.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(sup.count_kids(), 0);

    // Waiting again with nothing running succeeds without invoking hooks.
    assert!(sup.wait(None).await);
    assert_eq!(counters.reaped.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn overage_child_is_escalated_and_reaped() {
    let _guard = SEQ.lock().await;
    let counters = Arc::new(Counters::default());
    let mut cfg = fast_cfg();
    cfg.timeout = Duration::from_secs(1);
    cfg.kill_sequence = KillSequence::new(vec![KillStep::new(Signal::SIGTERM, 2)]);
    let mut sup = Supervisor::new(cfg, Arc::new(Tracking(Arc::clone(&counters)))).unwrap();

    sup.spawn(["sleep", "30"], SpawnOptions::new().with_id("slowpoke"))
        .await
        .unwrap();

    let begin = Instant::now();
    assert!(sup.wait(None).await);
    assert!(begin.elapsed() < Duration::from_secs(10));
    assert_eq!(counters.reaped.load(Ordering::SeqCst), 1);
    assert_eq!(sup.count_kids(), 0);
}

struct Exploding;

#[async_trait]
impl Hooks for Exploding {
    async fn on_reap(&self, _kid: &Kid) -> Result<(), HookError> {
        Err(HookError::new("always fails"))
    }

    async fn while_alive(&self, _kid: &Kid) -> Result<(), HookError> {
        panic!("alive hook panic");
    }
}

#[tokio::test]
async fn crashing_hooks_do_not_stall_reaping() {
    let _guard = SEQ.lock().await;
    let mut sup = Supervisor::new(fast_cfg(), Arc::new(Exploding)).unwrap();

    for _ in 0..3 {
        sup.spawn(["true"], SpawnOptions::new()).await.unwrap();
    }
    assert!(sup.wait(None).await);
    assert_eq!(sup.count_kids(), 0);
}

#[tokio::test]
async fn repeated_term_broadcast_is_idempotent() {
    let _guard = SEQ.lock().await;
    let mut sup = Supervisor::new(fast_cfg(), Arc::new(NoopHooks)).unwrap();
    sup.spawn(["sleep", "30"], SpawnOptions::new())
        .await
        .unwrap();

    sup.send_signal(Signal::SIGTERM);
    sup.send_signal(Signal::SIGTERM);
    // Broadcast mutates nothing; the record stays until the next sweep.
    assert_eq!(sup.count_kids(), 1);

    assert!(sup.wait(None).await);
    assert_eq!(sup.count_kids(), 0);
}

#[tokio::test]
async fn deadline_reports_survivors() {
    let _guard = SEQ.lock().await;
    let mut sup = Supervisor::new(fast_cfg(), Arc::new(NoopHooks)).unwrap();
    sup.spawn(
        ["sh", "-c", "trap '' TERM INT; sleep 60"],
        SpawnOptions::new().with_id("stubborn"),
    )
    .await
    .unwrap();

    // The child shrugs off the terminal TERM broadcast, so the deadline
    // leaves it in the registry for us to inspect.
    assert!(!sup.wait(Some(Duration::from_secs(1))).await);
    assert_eq!(sup.count_kids(), 1);
    assert_eq!(sup.kids().next().unwrap().id(), Some("stubborn"));

    // Cleanup: an unrefusable signal, then a normal wait.
    sup.send_signal(Signal::SIGKILL);
    assert!(sup.wait(None).await);
}

#[tokio::test]
async fn pgroup_backend_round_trip() {
    let _guard = SEQ.lock().await;
    let mut cfg = fast_cfg();
    cfg.backend = "pgroup".to_string();
    cfg.timeout = Duration::from_secs(1);
    cfg.kill_sequence = KillSequence::new(vec![KillStep::new(Signal::SIGKILL, 2)]);
    let mut sup = Supervisor::new(cfg, Arc::new(NoopHooks)).unwrap();

    // The shell's grandchild is in the same process group, so the group
    // escalation takes the whole tree down.
    sup.spawn(["sh", "-c", "sleep 30"], SpawnOptions::new())
        .await
        .unwrap();
    assert!(sup.wait(None).await);
}

#[tokio::test]
async fn kid_records_expose_metadata() {
    let _guard = SEQ.lock().await;
    let mut sup = Supervisor::new(fast_cfg(), Arc::new(NoopHooks)).unwrap();
    let handle = sup
        .spawn(
            ["sleep", "1"],
            SpawnOptions::new().with_id("meta").with_env("FOO", "bar"),
        )
        .await
        .unwrap();

    assert!(handle.pid() > 0);
    {
        let kid = sup.kids().next().unwrap();
        assert_eq!(kid.pid(), handle.pid());
        assert_eq!(kid.id(), Some("meta"));
        assert_eq!(kid.cmdline(), &["sleep", "1"][..]);
        assert_eq!(
            kid.options().env.get("FOO").map(String::as_str),
            Some("bar")
        );
    }
    assert!(sup.wait(None).await);
}

#[tokio::test]
async fn failed_spawn_leaves_registry_untouched() {
    let _guard = SEQ.lock().await;
    let mut sup = Supervisor::new(fast_cfg(), Arc::new(NoopHooks)).unwrap();

    let err = sup
        .spawn(["definitely-not-a-real-binary-47"], SpawnOptions::new())
        .await
        .expect_err("spawn must fail");
    assert_eq!(err.as_label(), "runtime_spawn_failed");
    assert_eq!(sup.count_kids(), 0);

    let err = sup
        .spawn(Vec::<String>::new(), SpawnOptions::new())
        .await
        .expect_err("empty cmdline must fail");
    assert_eq!(err.as_label(), "runtime_empty_cmdline");
}

#[test]
fn unknown_backend_fails_construction() {
    let mut cfg = Config::default();
    cfg.backend = "bogus".to_string();
    let err = Supervisor::new(cfg, Arc::new(NoopHooks)).expect_err("must not construct");
    assert_eq!(err.as_label(), "runtime_backend_not_found");
}
