//! Runtime core: registry, lifecycle engine and health supervision.
//!
//! The public API from this module is [`Orchestrator`] (built through
//! [`OrchestratorBuilder`]), its [`Config`], the [`HealthMonitor`] handle and
//! the report types in [`status`](self::status).
//!
//! Internal modules:
//! - [`registry`]: module records, capabilities and startup/shutdown orders;
//! - [`runner`]: one bounded, panic-contained call into module code;
//! - [`orchestrator`]: lifecycle, recovery and health passes;
//! - [`monitor`]: periodic health loop;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod config;
mod monitor;
mod orchestrator;
mod registry;
mod runner;
mod shutdown;
mod status;

pub use builder::OrchestratorBuilder;
pub use config::Config;
pub use monitor::HealthMonitor;
pub use orchestrator::Orchestrator;
pub use shutdown::wait_for_shutdown_signal;
pub use status::{
    FailureRecord, HealthReport, ModuleHealth, ModuleStatus, ModuleStatusEntry, RecoveryOutcome,
    RecoverySummary, StatusReport, SystemInfo,
};
