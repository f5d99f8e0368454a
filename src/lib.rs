//! # nodevisor
//!
//! **Nodevisor** is an in-process module orchestrator for Rust services.
//!
//! It owns a set of named modules (database pools, caches, monitors, RPC
//! clients...), starts them in priority order, stops them in reverse order,
//! probes their health and restarts failing ones under a bounded,
//! exponentially backed-off recovery policy.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Module    │   │    Module    │   │    Module    │
//!     │ (priority 0) │   │ (priority 1) │   │ (priority 2) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator (explicit context object, Arc<Orchestrator>)        │
//! │  - Registry (records, startup_order, shutdown_order)              │
//! │  - RecoveryPolicy (sliding window + BackoffPolicy)                │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   start_all()        stop_all()      check_all_health()      │
//!   (ascending)        (descending)    (probe ─► recover)      │
//!        │                  │                  ▲               │
//!        │                  │          ┌───────┴───────┐       │
//!        │                  │          │ HealthMonitor │       │
//!        │                  │          │ (every 30 s)  │       │
//!        │                  │          └───────────────┘       │
//!        ▼                  ▼                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                  (capacity: Config::bus_capacity)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          (per-sub queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                    worker1   worker2   workerN
//! ```
//!
//! ### Recovery
//! ```text
//! unhealthy / failed start
//!   └─► prune attempts older than window (300 s)
//!         ├─ attempts ≥ max (3) ─► permanently_failed, RecoveryExhausted
//!         └─ record attempt N
//!              ├─► publish RecoveryScheduled{ attempt: N, delay: 2^N s }
//!              ├─► stop()
//!              ├─► sleep(delay) (cancelled by stop_all)
//!              └─► start() ─┬─ Ok  ─► running (history kept)
//!                           └─ Err ─► failed
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Modules**       | Define managed units as trait impls or closures.             | [`Module`], [`ModuleFn`], [`Capabilities`]  |
//! | **Orchestration** | Ordered lifecycle, health passes, recovery.                  | [`Orchestrator`], [`HealthMonitor`]         |
//! | **Policies**      | Sliding-window recovery budget and exponential backoff.      | [`RecoveryPolicy`], [`BackoffPolicy`]       |
//! | **Reports**       | Serializable status and health views for an HTTP layer.      | [`StatusReport`], [`HealthReport`]          |
//! | **Subscriber API**| Hook into lifecycle events (audit, metrics, alerting).       | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for modules, orchestration and configuration.  | [`ModuleError`], [`OrchestratorError`]      |
//! | **Configuration** | Centralized runtime settings, loadable from TOML.            | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use nodevisor::{Config, Health, ModuleFn, ModuleStatus, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let orch = Orchestrator::builder(Config::default())
//!         .build()
//!         .expect("valid config");
//!
//!     orch.register_module(
//!         "db",
//!         ModuleFn::new()
//!             .on_start(|| async { Ok(()) })
//!             .on_stop(|| async { Ok(()) })
//!             .arc(),
//!         0,
//!     );
//!     orch.register_module(
//!         "cache",
//!         ModuleFn::new()
//!             .on_start(|| async { Ok(()) })
//!             .on_health(|| async { Ok(Health::healthy()) })
//!             .arc(),
//!         1,
//!     );
//!
//!     let report = orch.start_all().await;
//!     assert_eq!(report.startup_order, ["db", "cache"]);
//!     assert_eq!(report.status_of("cache"), Some(ModuleStatus::Running));
//!
//!     let health = orch.check_all_health().await;
//!     assert!(health.values().all(|h| h.healthy));
//!
//!     orch.stop_all().await;
//! }
//! ```
mod core;
mod error;
mod events;
mod modules;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    wait_for_shutdown_signal, Config, FailureRecord, HealthMonitor, HealthReport, ModuleHealth,
    ModuleStatus, ModuleStatusEntry, Orchestrator, OrchestratorBuilder, RecoveryOutcome,
    RecoverySummary, StatusReport, SystemInfo,
};
pub use error::{ConfigError, ModuleError, OrchestratorError};
pub use events::{Bus, Event, EventKind};
pub use modules::{Capabilities, Health, Module, ModuleFn, ModuleRef};
pub use policies::{BackoffPolicy, RecoveryDecision, RecoveryPolicy, RecoveryWindow};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
