//! # Status and report types.
//!
//! Everything the orchestrator hands back to callers: the per-module
//! [`ModuleStatus`], failure diagnostics, and the serializable reports
//! consumed by the HTTP layer (`StatusReport`, `HealthReport`,
//! `RecoverySummary`, `SystemInfo`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ModuleError;

/// Lifecycle status of a registered module.
///
/// ```text
/// registered ─► starting ─┬─► running ─► stopped
///                         └─► failed ─► (recovery) ─┬─► starting ...
///                                                   └─► permanently_failed
/// any ─► (stop error) ─► error
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Registered,
    Starting,
    Running,
    Stopped,
    Failed,
    /// Terminal for automatic paths; cleared only by re-registration or a manual restart.
    PermanentlyFailed,
    /// Stop raised an error.
    Error,
}

impl ModuleStatus {
    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Registered => "registered",
            ModuleStatus::Starting => "starting",
            ModuleStatus::Running => "running",
            ModuleStatus::Stopped => "stopped",
            ModuleStatus::Failed => "failed",
            ModuleStatus::PermanentlyFailed => "permanently_failed",
            ModuleStatus::Error => "error",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostics kept for the most recent failure of a module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// `start`, `stop` or `health_check`.
    pub operation: &'static str,
    /// Stable error label (see [`ModuleError::as_label`]).
    pub label: &'static str,
    pub message: String,
    /// Source chain followed by the first captured backtrace frames, if any.
    pub frames: Vec<String>,
    pub at: DateTime<Utc>,
}

/// Number of diagnostic frames kept per failure.
const MAX_FRAMES: usize = 5;

impl FailureRecord {
    pub fn capture(operation: &'static str, err: &ModuleError) -> Self {
        let mut frames = Vec::new();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            if frames.len() == MAX_FRAMES {
                break;
            }
            frames.push(cause.to_string());
            source = cause.source();
        }

        // Only populated when RUST_BACKTRACE / RUST_LIB_BACKTRACE enable capture.
        let bt = std::backtrace::Backtrace::capture();
        if bt.status() == std::backtrace::BacktraceStatus::Captured {
            let rendered = bt.to_string();
            let room = MAX_FRAMES.saturating_sub(frames.len());
            frames.extend(rendered.lines().take(room).map(|l| l.trim().to_string()));
        }

        Self {
            operation,
            label: err.as_label(),
            message: err.to_string(),
            frames,
            at: Utc::now(),
        }
    }
}

/// Health of one module as reported by `check_all_health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModuleHealth {
    pub healthy: bool,
    /// Probe detail, error message, or the status label for derived health.
    pub detail: String,
}

/// `{name: {healthy, detail}}`, ordered by name.
pub type HealthReport = BTreeMap<String, ModuleHealth>;

/// Entry of [`StatusReport::modules`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModuleStatusEntry {
    pub status: ModuleStatus,
    /// Recovery attempts inside the current window.
    pub recovery_attempts: usize,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Snapshot returned by `modules_status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub orchestrator_running: bool,
    pub modules: BTreeMap<String, ModuleStatusEntry>,
    pub startup_order: Vec<String>,
    pub total_modules: usize,
}

impl StatusReport {
    /// Status of `name`, if registered.
    pub fn status_of(&self, name: &str) -> Option<ModuleStatus> {
        self.modules.get(name).map(|m| m.status)
    }
}

/// Result of one health pass for one module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Healthy,
    Recovered,
    FailedRecovery,
    PermanentlyFailed,
    /// Unhealthy while the orchestrator is not running; recovery not attempted.
    Unhealthy,
}

/// Summary returned by `run_recovery_check`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecoverySummary {
    pub checked: usize,
    pub healthy: usize,
    pub recovered: usize,
    pub failed: usize,
    pub details: BTreeMap<String, RecoveryOutcome>,
}

impl RecoverySummary {
    pub(crate) fn push(&mut self, name: String, outcome: RecoveryOutcome) {
        self.checked += 1;
        match outcome {
            RecoveryOutcome::Healthy => self.healthy += 1,
            RecoveryOutcome::Recovered => self.recovered += 1,
            RecoveryOutcome::FailedRecovery
            | RecoveryOutcome::PermanentlyFailed
            | RecoveryOutcome::Unhealthy => self.failed += 1,
        }
        self.details.insert(name, outcome);
    }
}

/// Full system view returned by `system_info`.
#[derive(Clone, Debug, Serialize)]
pub struct SystemInfo {
    pub timestamp: DateTime<Utc>,
    pub orchestrator_running: bool,
    pub status: StatusReport,
    pub health: HealthReport,
    /// Seconds since the last `start_all`; `None` before the first one.
    pub uptime_secs: Option<f64>,
}
