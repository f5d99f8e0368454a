//! # Orchestrator: registry owner and lifecycle engine.
//!
//! The [`Orchestrator`] owns the module registry, drives ordered startup and
//! shutdown, probes health and runs the recovery policy. It is an explicit
//! context object: build it once at bootstrap with
//! [`OrchestratorBuilder`](crate::OrchestratorBuilder) and pass the `Arc`
//! to whatever needs it (HTTP layer, health monitor).
//!
//! ## High-level architecture
//! ```text
//! register_module(name, module, priority)
//!     └─► Registry (startup_order by priority, shutdown_order = reverse)
//!
//! start_all():  for name in startup_order  (sequential)
//!     └─► lock(module) ─► start_once ─┬─ Ok  ─► running
//!                                     └─ Err ─► failed ─► recover_locked
//!
//! stop_all():   cancel pending backoff, for name in shutdown_order
//!     └─► lock(module) ─► stop_once ─┬─ Ok  ─► stopped
//!                                    └─ Err ─► error (logged, continue)
//!
//! check_all_health(): for each module
//!     └─► lock(module) ─► probe ─► unhealthy? ─► recover_locked
//!
//! recover_locked():
//!     RecoveryPolicy::admit ─┬─ Exhausted ─► permanently_failed
//!                            └─ Retry{attempt, delay}
//!                                 └─► stop_once ─► sleep(delay, cancellable) ─► start_once
//! ```
//!
//! ## Rules
//! - Module errors never escape `start_all`/`stop_all`/`check_all_health`; they
//!   become status transitions, failure diagnostics, log records and events.
//! - Operations on the **same** module are serialized by its operation lock,
//!   held across the whole operation including nested recovery.
//! - The registry lock is never held across an `.await`.
//! - Starts issued by recovery keep the attempt history; other successful
//!   starts clear it.
//! - `permanently_failed` only leaves through `restart_module` or re-registration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::builder::OrchestratorBuilder;
use crate::core::config::Config;
use crate::core::monitor::HealthMonitor;
use crate::core::registry::{ModuleHandle, ModuleRecord, Registry};
use crate::core::runner::{run_probe, run_start, run_stop};
use crate::core::shutdown;
use crate::core::status::{
    FailureRecord, HealthReport, ModuleHealth, ModuleStatus, ModuleStatusEntry, RecoveryOutcome,
    RecoverySummary, StatusReport, SystemInfo,
};
use crate::error::{ModuleError, OrchestratorError};
use crate::events::{Bus, Event, EventKind};
use crate::modules::ModuleRef;
use crate::policies::RecoveryDecision;

/// Owns registered modules and drives their lifecycle.
pub struct Orchestrator {
    cfg: Config,
    bus: Bus,
    registry: RwLock<Registry>,
    running: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    /// Cancels pending recovery backoffs; replaced on every `start_all`.
    backoff_token: Mutex<CancellationToken>,
    /// Cancelled on drop; stops the subscriber listener.
    lifetime: CancellationToken,
}

impl Orchestrator {
    /// Starts building an orchestrator with `cfg`.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: Config, bus: Bus, lifetime: CancellationToken) -> Self {
        Self {
            cfg,
            bus,
            registry: RwLock::new(Registry::new()),
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
            backoff_token: Mutex::new(CancellationToken::new()),
            lifetime,
        }
    }

    /// Returns the configuration the orchestrator was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Creates a receiver for runtime events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// True between `start_all` and `stop_all`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ---------------------------
    // Registration
    // ---------------------------

    /// Registers `module` under `name`; lower `priority` starts first.
    ///
    /// Re-registering a name overwrites the previous record (status back to
    /// `registered`, attempt history emptied) and re-sorts both orders.
    pub fn register_module(&self, name: impl Into<String>, module: ModuleRef, priority: i32) {
        let name = name.into();
        let replaced = self.registry.write().register(&name, module, priority);

        info!(module = %name, priority, replaced, "module registered");
        let mut ev = Event::new(EventKind::ModuleRegistered).with_module(name.as_str());
        if replaced {
            ev = ev.with_reason("replaced");
        }
        self.publish(ev);
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Starts every module in startup order, one at a time.
    ///
    /// A failing module goes through recovery before the next one starts; it
    /// never stops the sequence. Returns the resulting status report.
    pub async fn start_all(&self) -> StatusReport {
        self.running.store(true, Ordering::SeqCst);
        *self.started_at.lock() = Some(Instant::now());
        *self.backoff_token.lock() = CancellationToken::new();

        let order = self.registry.read().startup_order().to_vec();
        info!(modules = order.len(), "starting modules");

        for name in order {
            let Some(handle) = self.handle(&name) else {
                continue;
            };
            let _guard = handle.op_lock.lock().await;
            self.start_contained(&handle).await;
        }

        let report = self.modules_status();
        info!(
            running = report.modules.values().filter(|m| m.status == ModuleStatus::Running).count(),
            total = report.total_modules,
            "startup sequence complete"
        );
        report
    }

    /// Stops every module in shutdown order regardless of its status.
    ///
    /// Pending recovery backoffs are cancelled first. Stop errors are logged
    /// and mark the module `error`; every module still gets its stop call.
    pub async fn stop_all(&self) -> StatusReport {
        self.request_shutdown();
        self.running.store(false, Ordering::SeqCst);

        let order = self.registry.read().shutdown_order().to_vec();
        info!(modules = order.len(), "stopping modules");

        for name in order {
            let Some(handle) = self.handle(&name) else {
                continue;
            };
            let _guard = handle.op_lock.lock().await;
            let _ = self.stop_once(&handle).await;
        }

        info!("all modules stopped");
        self.modules_status()
    }

    /// Cancels pending recovery backoffs and announces the shutdown.
    pub fn request_shutdown(&self) {
        self.backoff_token.lock().cancel();
        self.publish(Event::new(EventKind::ShutdownRequested));
    }

    /// Stops and starts one module with a fixed pause in between.
    ///
    /// Allowed in any status, including `permanently_failed` (manual override).
    /// A failing start goes through recovery like in `start_all`.
    pub async fn restart_module(&self, name: &str) -> Result<(), OrchestratorError> {
        let handle = self.require(name)?;
        let _guard = handle.op_lock.lock().await;

        info!(module = %name, "restarting module");
        self.publish(Event::new(EventKind::ModuleRestartRequested).with_module(name));

        let _ = self.stop_once(&handle).await;
        time::sleep(self.cfg.restart_delay).await;
        self.start_contained(&handle).await;
        Ok(())
    }

    /// Runs one recovery attempt for `name` (see [`RecoveryPolicy`](crate::RecoveryPolicy)).
    ///
    /// On exhaustion the module is already `permanently_failed` when this returns.
    pub async fn attempt_recovery(&self, name: &str) -> Result<(), OrchestratorError> {
        let handle = self.require(name)?;
        let _guard = handle.op_lock.lock().await;
        self.recover_locked(&handle).await
    }

    /// Start with containment: failure triggers recovery synchronously.
    async fn start_contained(&self, handle: &ModuleHandle) {
        if self.start_once(handle, false).await.is_err() {
            if let Err(e) = self.recover_locked(handle).await {
                debug!(module = %handle.name, error = %e, "recovery after failed start did not succeed");
            }
        }
    }

    /// Single start attempt. Caller holds the module's operation lock.
    async fn start_once(&self, handle: &ModuleHandle, keep_history: bool) -> Result<(), ModuleError> {
        let name = handle.name.as_str();
        self.set_status(handle, ModuleStatus::Starting);
        self.publish(Event::new(EventKind::ModuleStarting).with_module(name));
        debug!(module = %name, "starting module");

        match run_start(handle, self.cfg.start_timeout()).await {
            Ok(()) => {
                self.update(handle, |rec| {
                    rec.status = ModuleStatus::Running;
                    if !keep_history {
                        rec.recovery.clear();
                    }
                });
                info!(module = %name, "module started");
                self.publish(Event::new(EventKind::ModuleStarted).with_module(name));
                Ok(())
            }
            Err(e) => {
                let failure = FailureRecord::capture("start", &e);
                error!(
                    module = %name,
                    error = %e,
                    label = e.as_label(),
                    frames = ?failure.frames,
                    "module failed to start"
                );
                self.update(handle, |rec| {
                    rec.status = ModuleStatus::Failed;
                    rec.last_failure = Some(failure);
                });
                self.publish(
                    Event::new(EventKind::ModuleStartFailed)
                        .with_module(name)
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Single stop attempt. Caller holds the module's operation lock.
    async fn stop_once(&self, handle: &ModuleHandle) -> Result<(), ModuleError> {
        let name = handle.name.as_str();
        debug!(module = %name, "stopping module");

        match run_stop(handle, self.cfg.stop_timeout()).await {
            Ok(()) => {
                self.update(handle, |rec| settle_after_stop(rec, ModuleStatus::Stopped));
                info!(module = %name, "module stopped");
                self.publish(Event::new(EventKind::ModuleStopped).with_module(name));
                Ok(())
            }
            Err(e) => {
                error!(module = %name, error = %e, "error stopping module");
                let failure = FailureRecord::capture("stop", &e);
                self.update(handle, |rec| {
                    settle_after_stop(rec, ModuleStatus::Error);
                    rec.last_failure = Some(failure);
                });
                self.publish(
                    Event::new(EventKind::ModuleStopFailed)
                        .with_module(name)
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Prune, check, append; then stop ─► backoff ─► start.
    async fn recover_locked(&self, handle: &ModuleHandle) -> Result<(), OrchestratorError> {
        let name = handle.name.as_str();
        let policy = self.cfg.recovery;

        let decision = {
            let mut reg = self.registry.write();
            let Some(rec) = reg.record_mut(handle) else {
                return Err(OrchestratorError::UnknownModule {
                    name: name.to_string(),
                });
            };
            let now = Instant::now();
            if rec.status == ModuleStatus::PermanentlyFailed {
                RecoveryDecision::Exhausted {
                    attempts: rec.recovery.recent(now, policy.window),
                }
            } else {
                policy.admit(&mut rec.recovery, now)
            }
        };

        let (attempt, delay) = match decision {
            RecoveryDecision::Exhausted { attempts } => {
                self.set_status(handle, ModuleStatus::PermanentlyFailed);
                error!(
                    module = %name,
                    attempts,
                    window = ?policy.window,
                    "max recovery attempts reached; module permanently failed"
                );
                self.publish(
                    Event::new(EventKind::RecoveryExhausted)
                        .with_module(name)
                        .with_attempt(attempts as u32),
                );
                return Err(OrchestratorError::RecoveryExhausted {
                    name: name.to_string(),
                    attempts,
                    window: policy.window,
                });
            }
            RecoveryDecision::Retry { attempt, delay } => (attempt, delay),
        };

        info!(module = %name, attempt, delay = ?delay, "attempting recovery");
        self.publish(
            Event::new(EventKind::RecoveryScheduled)
                .with_module(name)
                .with_attempt(attempt)
                .with_delay(delay),
        );

        let _ = self.stop_once(handle).await;
        if !self.backoff(delay).await {
            warn!(module = %name, attempt, "recovery cancelled during backoff");
            return Err(OrchestratorError::RecoveryCancelled {
                name: name.to_string(),
            });
        }

        match self.start_once(handle, true).await {
            Ok(()) => {
                info!(module = %name, attempt, "module recovered");
                Ok(())
            }
            Err(source) => Err(OrchestratorError::RecoveryFailed {
                name: name.to_string(),
                attempt,
                source,
            }),
        }
    }

    /// Sleeps for `delay` unless a shutdown is requested. Returns `false` if cancelled.
    async fn backoff(&self, delay: Duration) -> bool {
        let token = self.backoff_token.lock().clone();
        if token.is_cancelled() {
            return false;
        }
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => true,
            _ = token.cancelled() => false,
        }
    }

    // ---------------------------
    // Health
    // ---------------------------

    /// Probes every module and returns `{name: {healthy, detail}}`.
    ///
    /// While the orchestrator is running, every unhealthy result triggers
    /// recovery for that module before the next one is probed
    /// (`permanently_failed` modules are reported but left alone).
    pub async fn check_all_health(&self) -> HealthReport {
        self.health_pass()
            .await
            .into_iter()
            .map(|(name, health, _)| (name, health))
            .collect()
    }

    /// One health pass, summarized as recovery outcomes.
    pub async fn run_recovery_check(&self) -> RecoverySummary {
        let mut summary = RecoverySummary::default();
        for (name, _, outcome) in self.health_pass().await {
            summary.push(name, outcome);
        }
        summary
    }

    async fn health_pass(&self) -> Vec<(String, ModuleHealth, RecoveryOutcome)> {
        let order = self.registry.read().startup_order().to_vec();
        let mut results = Vec::with_capacity(order.len());

        for name in order {
            let Some(handle) = self.handle(&name) else {
                continue;
            };
            let _guard = handle.op_lock.lock().await;

            let health = self.probe_locked(&handle).await;
            let outcome = if health.healthy {
                RecoveryOutcome::Healthy
            } else {
                self.on_unhealthy(&handle, &health).await
            };
            results.push((name, health, outcome));
        }
        results
    }

    async fn on_unhealthy(&self, handle: &ModuleHandle, health: &ModuleHealth) -> RecoveryOutcome {
        let name = handle.name.as_str();
        if self.status_of(handle) == Some(ModuleStatus::PermanentlyFailed) {
            return RecoveryOutcome::PermanentlyFailed;
        }

        warn!(module = %name, detail = %health.detail, "module is unhealthy");
        self.publish(
            Event::new(EventKind::ModuleUnhealthy)
                .with_module(name)
                .with_reason(health.detail.as_str()),
        );

        if !self.is_running() {
            return RecoveryOutcome::Unhealthy;
        }
        match self.recover_locked(handle).await {
            Ok(()) => RecoveryOutcome::Recovered,
            Err(e) if e.is_exhausted() => RecoveryOutcome::PermanentlyFailed,
            Err(_) => RecoveryOutcome::FailedRecovery,
        }
    }

    /// Explicit probe when the capability exists, status-derived otherwise.
    async fn probe_locked(&self, handle: &ModuleHandle) -> ModuleHealth {
        if !handle.caps.health_check {
            let status = self.status_of(handle).unwrap_or(ModuleStatus::Registered);
            return ModuleHealth {
                healthy: status == ModuleStatus::Running,
                detail: status.as_str().to_string(),
            };
        }

        match run_probe(handle, self.cfg.health_timeout()).await {
            Ok(h) => ModuleHealth {
                detail: h
                    .detail
                    .unwrap_or_else(|| if h.healthy { "ok" } else { "unhealthy" }.to_string()),
                healthy: h.healthy,
            },
            Err(e) => {
                warn!(module = %handle.name, error = %e, "health check failed");
                let failure = FailureRecord::capture("health_check", &e);
                self.update(handle, |rec| rec.last_failure = Some(failure));
                ModuleHealth {
                    healthy: false,
                    detail: e.to_string(),
                }
            }
        }
    }

    // ---------------------------
    // Reporting
    // ---------------------------

    /// Snapshot of the orchestrator and every module.
    pub fn modules_status(&self) -> StatusReport {
        let reg = self.registry.read();
        let now = Instant::now();
        let window = self.cfg.recovery.window;

        let modules: BTreeMap<String, ModuleStatusEntry> = reg
            .records()
            .map(|(name, rec)| {
                (
                    name.to_string(),
                    ModuleStatusEntry {
                        status: rec.status,
                        recovery_attempts: rec.recovery.recent(now, window),
                        priority: rec.priority,
                        last_error: rec.last_failure.as_ref().map(|f| f.message.clone()),
                    },
                )
            })
            .collect();

        StatusReport {
            orchestrator_running: self.is_running(),
            total_modules: reg.len(),
            startup_order: reg.startup_order().to_vec(),
            modules,
        }
    }

    /// Status report plus a fresh health pass and uptime.
    ///
    /// Note: the health pass may trigger recovery, exactly like `check_all_health`.
    pub async fn system_info(&self) -> SystemInfo {
        let health = self.check_all_health().await;
        let uptime_secs = self.uptime().map(|d| d.as_secs_f64());
        SystemInfo {
            timestamp: Utc::now(),
            orchestrator_running: self.is_running(),
            status: self.modules_status(),
            health,
            uptime_secs,
        }
    }

    /// Time since the last `start_all`.
    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.lock().map(|t| t.elapsed())
    }

    pub fn module_status(&self, name: &str) -> Option<ModuleStatus> {
        self.registry.read().record(name).map(|r| r.status)
    }

    /// Diagnostics of the most recent failure of `name`.
    pub fn last_failure(&self, name: &str) -> Option<FailureRecord> {
        self.registry
            .read()
            .record(name)
            .and_then(|r| r.last_failure.clone())
    }

    /// Startup order snapshot.
    pub fn startup_order(&self) -> Vec<String> {
        self.registry.read().startup_order().to_vec()
    }

    /// Shutdown order snapshot.
    pub fn shutdown_order(&self) -> Vec<String> {
        self.registry.read().shutdown_order().to_vec()
    }

    // ---------------------------
    // Process integration
    // ---------------------------

    /// Spawns the periodic health supervisor loop.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> HealthMonitor {
        HealthMonitor::spawn(Arc::clone(self))
    }

    /// Starts all modules, supervises health until a termination signal, then
    /// shuts down in order and returns the final status.
    pub async fn run_until_signal(self: &Arc<Self>) -> Result<StatusReport, OrchestratorError> {
        self.start_all().await;
        let monitor = self.spawn_health_monitor();

        let signal = shutdown::wait_for_shutdown_signal().await;
        if let Ok(sig) = &signal {
            info!(signal = sig, "shutdown signal received");
        }

        self.request_shutdown();
        monitor.stop().await;
        let report = self.stop_all().await;
        signal?;
        Ok(report)
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn handle(&self, name: &str) -> Option<ModuleHandle> {
        self.registry.read().handle(name)
    }

    fn require(&self, name: &str) -> Result<ModuleHandle, OrchestratorError> {
        self.handle(name).ok_or_else(|| {
            warn!(module = %name, "operation on unknown module");
            OrchestratorError::UnknownModule {
                name: name.to_string(),
            }
        })
    }

    fn update(&self, handle: &ModuleHandle, f: impl FnOnce(&mut ModuleRecord)) {
        if let Some(rec) = self.registry.write().record_mut(handle) {
            f(rec);
        }
    }

    fn set_status(&self, handle: &ModuleHandle, status: ModuleStatus) {
        self.update(handle, |rec| rec.status = status);
    }

    fn status_of(&self, handle: &ModuleHandle) -> Option<ModuleStatus> {
        self.registry.read().record(&handle.name).map(|r| r.status)
    }
}

/// Status after a stop call; `permanently_failed` survives both outcomes.
fn settle_after_stop(rec: &mut ModuleRecord, status: ModuleStatus) {
    if rec.status != ModuleStatus::PermanentlyFailed {
        rec.status = status;
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.backoff_token.lock().cancel();
        self.lifetime.cancel();
    }
}
