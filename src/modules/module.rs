//! # Module abstraction: the contract every managed unit satisfies.
//!
//! A [`Module`] may expose any subset of three capabilities: `start`, `stop`
//! and `health_check`. Which ones it actually provides is declared through
//! [`Module::capabilities`], which the orchestrator reads **once** at
//! registration and keeps next to the record. Missing `start`/`stop` are
//! no-ops; a missing health check means "healthy iff status is running".

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ModuleError;

/// Shared handle to a module (`Arc<dyn Module>`).
pub type ModuleRef = Arc<dyn Module>;

/// Set of capabilities a module exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Module has initialization logic.
    pub start: bool,
    /// Module has resource release logic.
    pub stop: bool,
    /// Module can report its own health.
    pub health_check: bool,
}

impl Capabilities {
    /// Nothing but identity.
    pub const NONE: Self = Self {
        start: false,
        stop: false,
        health_check: false,
    };

    /// `start` + `stop`, health derived from status.
    pub const LIFECYCLE: Self = Self {
        start: true,
        stop: true,
        health_check: false,
    };

    /// Every capability.
    pub const ALL: Self = Self {
        start: true,
        stop: true,
        health_check: true,
    };

    /// Returns a copy with the health-check capability enabled.
    pub const fn with_health_check(mut self) -> Self {
        self.health_check = true;
        self
    }
}

impl Default for Capabilities {
    /// Returns [`Capabilities::LIFECYCLE`].
    fn default() -> Self {
        Capabilities::LIFECYCLE
    }
}

/// Verdict returned by a module health probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Health {
    /// Whether the module considers itself operational.
    pub healthy: bool,
    /// Optional free-form detail (reason, lag, connection count...).
    pub detail: Option<String>,
}

impl Health {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            detail: None,
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: Some(detail.into()),
        }
    }

    /// Attaches a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<bool> for Health {
    fn from(healthy: bool) -> Self {
        Self {
            healthy,
            detail: None,
        }
    }
}

/// # Long-lived unit managed by the orchestrator.
///
/// Every method has a default so implementors only write what they need, but
/// the orchestrator only calls what [`capabilities`](Module::capabilities)
/// advertises. Override `capabilities` when adding a health check.
///
/// `stop` must be safe to call even if `start` never completed.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use nodevisor::{Capabilities, Health, Module, ModuleError};
///
/// struct Cache;
///
/// #[async_trait]
/// impl Module for Cache {
///     fn capabilities(&self) -> Capabilities {
///         Capabilities::ALL
///     }
///
///     async fn start(&self) -> Result<(), ModuleError> {
///         Ok(())
///     }
///
///     async fn health_check(&self) -> Result<Health, ModuleError> {
///         Ok(Health::healthy().with_detail("hit ratio 0.93"))
///     }
/// }
/// ```
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Capabilities this module exposes. Read once at registration.
    ///
    /// Defaults to [`Capabilities::LIFECYCLE`], which does **not** include the
    /// health check.
    fn capabilities(&self) -> Capabilities {
        Capabilities::LIFECYCLE
    }

    /// Initializes the module. May suspend for as long as setup takes.
    async fn start(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Releases module resources.
    async fn stop(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Reports module health. Called under a short timeout.
    ///
    /// Only called when [`capabilities`](Module::capabilities) sets
    /// `health_check`; the default capabilities do not, so an implementation
    /// of this method must come with an override such as
    /// `Capabilities::LIFECYCLE.with_health_check()`. Without it the module's
    /// health is derived from its status and this method is never invoked.
    async fn health_check(&self) -> Result<Health, ModuleError> {
        Ok(Health::healthy())
    }
}
