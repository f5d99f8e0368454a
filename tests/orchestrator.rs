use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use nodevisor::{
    Config, Event, EventKind, Health, ModuleError, ModuleFn, ModuleRef, ModuleStatus,
    Orchestrator, OrchestratorError, RecoveryOutcome, Subscribe,
};

/// Shared log of lifecycle calls, in call order.
type Calls = Arc<Mutex<Vec<String>>>;

fn recording(name: &'static str, calls: &Calls) -> ModuleRef {
    let on_start = Arc::clone(calls);
    let on_stop = Arc::clone(calls);
    ModuleFn::new()
        .on_start(move || {
            let calls = Arc::clone(&on_start);
            async move {
                calls.lock().push(format!("start:{name}"));
                Ok(())
            }
        })
        .on_stop(move || {
            let calls = Arc::clone(&on_stop);
            async move {
                calls.lock().push(format!("stop:{name}"));
                Ok(())
            }
        })
        .arc()
}

fn always_unhealthy(starts: &Arc<AtomicU32>) -> ModuleRef {
    let starts = Arc::clone(starts);
    ModuleFn::new()
        .on_start(move || {
            let starts = Arc::clone(&starts);
            async move {
                starts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .on_stop(|| async { Ok(()) })
        .on_health(|| async { Ok(Health::unhealthy("replication lag")) })
        .arc()
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn starts_by_priority_and_stops_in_reverse() {
    let calls: Calls = Arc::default();
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("A", recording("A", &calls), 1);
    orch.register_module("B", recording("B", &calls), 0);

    let report = orch.start_all().await;
    assert!(report.orchestrator_running);
    assert_eq!(report.startup_order, ["B", "A"]);
    assert_eq!(report.status_of("A"), Some(ModuleStatus::Running));
    assert_eq!(report.status_of("B"), Some(ModuleStatus::Running));

    let report = orch.stop_all().await;
    assert!(!report.orchestrator_running);
    assert_eq!(
        *calls.lock(),
        ["start:B", "start:A", "stop:A", "stop:B"].map(String::from)
    );
    assert_eq!(orch.shutdown_order(), ["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn stop_all_is_idempotent() {
    let calls: Calls = Arc::default();
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("db", recording("db", &calls), 0);
    orch.register_module("api", recording("api", &calls), 1);

    orch.start_all().await;
    orch.stop_all().await;
    let report = orch.stop_all().await;

    for entry in report.modules.values() {
        assert_eq!(entry.status, ModuleStatus::Stopped);
    }
    assert_eq!(report.total_modules, 2);
}

#[tokio::test(start_paused = true)]
async fn stop_errors_do_not_interrupt_shutdown() {
    let calls: Calls = Arc::default();
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("db", recording("db", &calls), 0);
    orch.register_module(
        "queue",
        ModuleFn::new()
            .on_stop(|| async { Err(ModuleError::shutdown("broker unreachable")) })
            .arc(),
        1,
    );

    orch.start_all().await;
    let report = orch.stop_all().await;

    assert_eq!(report.status_of("queue"), Some(ModuleStatus::Error));
    assert_eq!(report.status_of("db"), Some(ModuleStatus::Stopped));
    assert_eq!(
        report.modules["queue"].last_error.as_deref(),
        Some("shutdown failed: broker unreachable")
    );
    assert!(calls.lock().contains(&"stop:db".to_string()));
}

#[tokio::test(start_paused = true)]
async fn always_unhealthy_module_exhausts_recovery_budget() {
    let starts = Arc::new(AtomicU32::new(0));
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("replica", always_unhealthy(&starts), 0);
    let mut rx = orch.subscribe();

    orch.start_all().await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        let summary = orch.run_recovery_check().await;
        assert_eq!(summary.details["replica"], RecoveryOutcome::Recovered);
    }
    assert_eq!(starts.load(Ordering::SeqCst), 4);

    let summary = orch.run_recovery_check().await;
    assert_eq!(summary.details["replica"], RecoveryOutcome::PermanentlyFailed);
    assert_eq!(
        orch.module_status("replica"),
        Some(ModuleStatus::PermanentlyFailed)
    );

    // Further passes leave the module alone.
    orch.check_all_health().await;
    assert_eq!(starts.load(Ordering::SeqCst), 4);

    let delays: Vec<Duration> = drain(&mut rx)
        .iter()
        .filter(|e| e.kind == EventKind::RecoveryScheduled)
        .filter_map(Event::delay)
        .collect();
    assert_eq!(
        delays,
        [2, 4, 8].map(Duration::from_secs),
        "backoff doubles per attempt"
    );
}

#[tokio::test(start_paused = true)]
async fn recovery_waits_for_backoff_before_start() {
    let starts = Arc::new(AtomicU32::new(0));
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("replica", always_unhealthy(&starts), 0);
    orch.start_all().await;

    let before = Instant::now();
    orch.attempt_recovery("replica").await.expect("first attempt");
    assert_eq!(before.elapsed(), Duration::from_secs(2));

    let before = Instant::now();
    orch.attempt_recovery("replica").await.expect("second attempt");
    assert_eq!(before.elapsed(), Duration::from_secs(4));

    assert_eq!(orch.modules_status().modules["replica"].recovery_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_is_reported_to_the_caller() {
    let starts = Arc::new(AtomicU32::new(0));
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("replica", always_unhealthy(&starts), 0);
    orch.start_all().await;

    for _ in 0..3 {
        orch.attempt_recovery("replica").await.expect("admitted");
    }
    let err = orch.attempt_recovery("replica").await.unwrap_err();
    assert!(err.is_exhausted());
    assert!(matches!(
        err,
        OrchestratorError::RecoveryExhausted { attempts: 3, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn flaky_start_recovers_and_attempts_expire() {
    let starts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&starts);
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module(
        "C",
        ModuleFn::new()
            .on_start(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ModuleError::startup("dependency not ready"))
                    } else {
                        Ok(())
                    }
                }
            })
            .arc(),
        0,
    );

    let report = orch.start_all().await;
    assert_eq!(report.status_of("C"), Some(ModuleStatus::Running));
    assert_eq!(report.modules["C"].recovery_attempts, 1);
    assert_eq!(starts.load(Ordering::SeqCst), 2);

    let failure = orch.last_failure("C").expect("first start failure kept");
    assert_eq!(failure.operation, "start");

    let health = orch.check_all_health().await;
    assert!(health["C"].healthy);
    assert_eq!(orch.modules_status().modules["C"].recovery_attempts, 1);

    time::advance(Duration::from_secs(300)).await;
    assert_eq!(orch.modules_status().modules["C"].recovery_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn status_derived_health_skips_health_checks() {
    let calls: Calls = Arc::default();
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("D", recording("D", &calls), 0);

    let health = orch.check_all_health().await;
    assert!(!health["D"].healthy);
    assert_eq!(health["D"].detail, "registered");

    orch.start_all().await;
    let health = orch.check_all_health().await;
    assert!(health["D"].healthy);
    assert_eq!(health["D"].detail, "running");
    assert_eq!(*calls.lock(), ["start:D".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn reregistration_reorders_both_lists() {
    let calls: Calls = Arc::default();
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("a", recording("a", &calls), 0);
    orch.register_module("b", recording("b", &calls), 1);
    orch.register_module("c", recording("c", &calls), 2);

    orch.register_module("a", recording("a", &calls), 3);
    assert_eq!(orch.startup_order(), ["b", "c", "a"]);
    assert_eq!(orch.shutdown_order(), ["a", "c", "b"]);
    assert_eq!(orch.modules_status().total_modules, 3);
}

#[tokio::test(start_paused = true)]
async fn manual_restart_overrides_permanent_failure() {
    let starts = Arc::new(AtomicU32::new(0));
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("replica", always_unhealthy(&starts), 0);
    orch.start_all().await;
    for _ in 0..4 {
        orch.check_all_health().await;
    }
    assert_eq!(
        orch.module_status("replica"),
        Some(ModuleStatus::PermanentlyFailed)
    );

    orch.restart_module("replica").await.expect("restart");
    assert_eq!(orch.module_status("replica"), Some(ModuleStatus::Running));
    assert_eq!(orch.modules_status().modules["replica"].recovery_attempts, 0);

    let err = orch.restart_module("missing").await.unwrap_err();
    assert_eq!(err.as_label(), "orchestrator_unknown_module");
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_backoff_promptly() {
    let starts = Arc::new(AtomicU32::new(0));
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("replica", always_unhealthy(&starts), 0);
    orch.start_all().await;

    let pass = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run_recovery_check().await })
    };
    time::sleep(Duration::from_millis(100)).await;

    let before = Instant::now();
    orch.stop_all().await;
    let summary = pass.await.expect("join");

    assert!(before.elapsed() < Duration::from_secs(2));
    assert_eq!(summary.details["replica"], RecoveryOutcome::FailedRecovery);
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(orch.module_status("replica"), Some(ModuleStatus::Stopped));
}

#[tokio::test(start_paused = true)]
async fn health_monitor_runs_cycles_until_stopped() {
    let checks = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&checks);
    let cfg = Config {
        health_interval: Duration::from_secs(10),
        ..Config::default()
    };
    let orch = Orchestrator::builder(cfg).build().expect("valid config");
    orch.register_module(
        "cache",
        ModuleFn::new()
            .on_health(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Health::healthy())
                }
            })
            .arc(),
        0,
    );
    orch.start_all().await;

    let monitor = orch.spawn_health_monitor();
    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(checks.load(Ordering::SeqCst), 0, "first cycle after one interval");

    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(checks.load(Ordering::SeqCst), 3);

    monitor.stop().await;
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(checks.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn system_info_combines_status_and_health() {
    let calls: Calls = Arc::default();
    let orch = Orchestrator::builder(Config::default()).build().expect("valid config");
    orch.register_module("db", recording("db", &calls), 0);
    assert!(orch.system_info().await.uptime_secs.is_none());

    orch.start_all().await;
    time::advance(Duration::from_secs(42)).await;

    let info = orch.system_info().await;
    assert!(info.orchestrator_running);
    assert_eq!(info.uptime_secs, Some(42.0));
    assert!(info.health["db"].healthy);
    assert_eq!(info.status.status_of("db"), Some(ModuleStatus::Running));

    let json = serde_json::to_value(&info).expect("json");
    assert_eq!(json["status"]["modules"]["db"]["status"], "running");
}

#[derive(Default)]
struct KindRecorder {
    seen: Mutex<Vec<(EventKind, Option<String>)>>,
    done: AtomicBool,
}

#[async_trait]
impl Subscribe for KindRecorder {
    async fn on_event(&self, event: &Event) {
        self.seen
            .lock()
            .push((event.kind, event.module.as_deref().map(String::from)));
        if event.kind == EventKind::ModuleStopped {
            self.done.store(true, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "kind_recorder"
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_lifecycle_events() {
    let rec = Arc::new(KindRecorder::default());
    let calls: Calls = Arc::default();
    let orch = Orchestrator::builder(Config::default())
        .with_subscriber(rec.clone())
        .build()
        .expect("valid config");

    orch.register_module("db", recording("db", &calls), 0);
    orch.start_all().await;
    orch.stop_all().await;

    while !rec.done.load(Ordering::SeqCst) {
        time::sleep(Duration::from_millis(1)).await;
    }

    let kinds: Vec<EventKind> = rec.seen.lock().iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        [
            EventKind::ModuleRegistered,
            EventKind::ModuleStarting,
            EventKind::ModuleStarted,
            EventKind::ShutdownRequested,
            EventKind::ModuleStopped,
        ]
    );
    assert!(rec
        .seen
        .lock()
        .iter()
        .filter(|(k, _)| *k != EventKind::ShutdownRequested)
        .all(|(_, m)| m.as_deref() == Some("db")));
}

#[tokio::test(start_paused = true)]
async fn monitor_stop_lets_in_flight_health_check_finish() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let cfg = Config {
        health_interval: Duration::from_secs(10),
        ..Config::default()
    };
    let orch = Orchestrator::builder(cfg).build().expect("valid config");
    orch.register_module(
        "indexer",
        ModuleFn::new()
            .on_health(move || {
                let flag = Arc::clone(&flag);
                async move {
                    time::sleep(Duration::from_secs(4)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(Health::healthy())
                }
            })
            .arc(),
        0,
    );
    orch.start_all().await;

    let monitor = orch.spawn_health_monitor();
    // First cycle begins at t=10s; stop while its health check is still sleeping.
    time::sleep(Duration::from_secs(11)).await;
    assert!(!finished.load(Ordering::SeqCst));

    let before = Instant::now();
    monitor.stop().await;
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(before.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn reregistration_keeps_operations_on_one_module_serialized() {
    let in_flight = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let module: ModuleRef = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        ModuleFn::new()
            .on_start(move || {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    time::sleep(Duration::from_secs(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .on_stop(|| async { Ok(()) })
            .arc()
    };

    let orch = Orchestrator::builder(Config::default())
        .build()
        .expect("valid config");
    orch.register_module("m", Arc::clone(&module), 0);
    orch.start_all().await;

    let recovery = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.attempt_recovery("m").await })
    };
    // Recovery is now waiting out its backoff.
    time::sleep(Duration::from_millis(100)).await;
    orch.register_module("m", Arc::clone(&module), 5);

    let restart = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.restart_module("m").await })
    };

    let _ = recovery.await.expect("join");
    restart.await.expect("join").expect("restart");

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(orch.module_status("m"), Some(ModuleStatus::Running));
    assert_eq!(orch.startup_order(), ["m"]);
}

struct UndeclaredHealthCheck {
    checks: AtomicU32,
}

#[async_trait]
impl nodevisor::Module for UndeclaredHealthCheck {
    async fn health_check(&self) -> Result<Health, ModuleError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(Health::unhealthy("not consulted"))
    }
}

#[tokio::test(start_paused = true)]
async fn undeclared_health_check_falls_back_to_status() {
    let module = Arc::new(UndeclaredHealthCheck {
        checks: AtomicU32::new(0),
    });
    let orch = Orchestrator::builder(Config::default())
        .build()
        .expect("valid config");
    orch.register_module("gossip", module.clone(), 0);
    orch.start_all().await;

    let health = orch.check_all_health().await;
    assert!(health["gossip"].healthy);
    assert_eq!(health["gossip"].detail, "running");
    assert_eq!(module.checks.load(Ordering::SeqCst), 0);
}
