//! Error types used by the orchestrator and by managed modules.
//!
//! This module defines three enums:
//!
//! - [`ModuleError`]: failures raised by a module's own start/stop/health code.
//! - [`OrchestratorError`]: failures surfaced by the orchestrator API itself.
//! - [`ConfigError`]: failures while loading a [`Config`](crate::Config).
//!
//! Module errors never reach callers of `start_all`/`stop_all`/`check_all_health`:
//! they are turned into status transitions, log records and events. The
//! `as_label` helpers give stable snake_case names for logs and metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by managed modules.
///
/// Returned from [`Module`](crate::Module) implementations. The orchestrator
/// also produces [`ModuleError::Timeout`] when a bounded call runs too long,
/// and maps panics inside module code to the variant of the failing operation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// Module failed to initialize.
    #[error("startup failed: {error}")]
    Startup {
        /// The underlying error message.
        error: String,
    },

    /// Module failed to release its resources (non-fatal to the orchestrator).
    #[error("shutdown failed: {error}")]
    Shutdown {
        /// The underlying error message.
        error: String,
    },

    /// Health probe raised an error; the module is treated as unhealthy.
    #[error("health check failed: {error}")]
    HealthCheck {
        /// The underlying error message.
        error: String,
    },

    /// A bounded module call did not finish in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out (`start`, `stop` or `health_check`).
        operation: &'static str,
        /// The timeout that was exceeded.
        timeout: Duration,
    },
}

impl ModuleError {
    /// Shorthand for [`ModuleError::Startup`].
    pub fn startup(error: impl std::fmt::Display) -> Self {
        ModuleError::Startup {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`ModuleError::Shutdown`].
    pub fn shutdown(error: impl std::fmt::Display) -> Self {
        ModuleError::Shutdown {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`ModuleError::HealthCheck`].
    pub fn health_check(error: impl std::fmt::Display) -> Self {
        ModuleError::HealthCheck {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use nodevisor::ModuleError;
    ///
    /// let err = ModuleError::startup("port in use");
    /// assert_eq!(err.as_label(), "module_startup");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ModuleError::Startup { .. } => "module_startup",
            ModuleError::Shutdown { .. } => "module_shutdown",
            ModuleError::HealthCheck { .. } => "module_health_check",
            ModuleError::Timeout { .. } => "module_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ModuleError::Startup { error } => format!("startup: {error}"),
            ModuleError::Shutdown { error } => format!("shutdown: {error}"),
            ModuleError::HealthCheck { error } => format!("health: {error}"),
            ModuleError::Timeout { operation, timeout } => {
                format!("{operation} timeout: {timeout:?}")
            }
        }
    }
}

/// # Errors surfaced by the orchestrator API.
///
/// Only [`OrchestratorError::UnknownModule`] indicates caller misuse; the
/// recovery variants are returned by
/// [`Orchestrator::attempt_recovery`](crate::Orchestrator::attempt_recovery)
/// and are already reflected in the module status when they are returned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Operation referenced a module name that was never registered.
    #[error("unknown module: {name}")]
    UnknownModule {
        /// The name that was looked up.
        name: String,
    },

    /// Recovery budget is spent within the window; the module is permanently failed.
    #[error("recovery exhausted for {name}: {attempts} attempts within {window:?}")]
    RecoveryExhausted {
        /// Module name.
        name: String,
        /// Attempts counted inside the window.
        attempts: usize,
        /// The recovery window.
        window: Duration,
    },

    /// Recovery ran but the module failed to start again.
    #[error("recovery attempt {attempt} for {name} failed: {source}")]
    RecoveryFailed {
        /// Module name.
        name: String,
        /// Attempt number within the window (1-based).
        attempt: u32,
        /// The start failure.
        #[source]
        source: ModuleError,
    },

    /// Recovery backoff was interrupted by a shutdown request.
    #[error("recovery for {name} cancelled by shutdown")]
    RecoveryCancelled {
        /// Module name.
        name: String,
    },

    /// Termination signal handlers could not be installed.
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use nodevisor::OrchestratorError;
    ///
    /// let err = OrchestratorError::UnknownModule { name: "db".into() };
    /// assert_eq!(err.as_label(), "orchestrator_unknown_module");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::UnknownModule { .. } => "orchestrator_unknown_module",
            OrchestratorError::RecoveryExhausted { .. } => "orchestrator_recovery_exhausted",
            OrchestratorError::RecoveryFailed { .. } => "orchestrator_recovery_failed",
            OrchestratorError::RecoveryCancelled { .. } => "orchestrator_recovery_cancelled",
            OrchestratorError::Signal(_) => "orchestrator_signal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            OrchestratorError::UnknownModule { name } => format!("module {name:?} is not registered"),
            OrchestratorError::RecoveryExhausted {
                name,
                attempts,
                window,
            } => format!("module {name:?} exhausted {attempts} recoveries within {window:?}"),
            OrchestratorError::RecoveryFailed {
                name,
                attempt,
                source,
            } => format!("module {name:?} recovery #{attempt}: {}", source.as_message()),
            OrchestratorError::RecoveryCancelled { name } => {
                format!("module {name:?} recovery cancelled")
            }
            OrchestratorError::Signal(e) => format!("signal: {e}"),
        }
    }

    /// True when the error means the module reached `permanently_failed`.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, OrchestratorError::RecoveryExhausted { .. })
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid TOML or has mistyped keys.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value for `{key}`: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}
