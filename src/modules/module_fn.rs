//! # Closure-backed module (`ModuleFn`)
//!
//! [`ModuleFn`] assembles a [`Module`] from optional callbacks. Each callback
//! *creates* a fresh future per call, so no state is shared between calls
//! unless the closure captures it explicitly (e.g. an `Arc<...>`).
//!
//! The advertised [`Capabilities`] follow directly from which callbacks were
//! supplied: a `ModuleFn` without `on_health` has no health check.
//!
//! ## Example
//! ```rust
//! use nodevisor::{Health, ModuleError, ModuleFn, ModuleRef};
//!
//! let m: ModuleRef = ModuleFn::new()
//!     .on_start(|| async { Ok::<_, ModuleError>(()) })
//!     .on_health(|| async { Ok::<_, ModuleError>(Health::healthy()) })
//!     .arc();
//!
//! assert!(m.capabilities().health_check);
//! assert!(!m.capabilities().stop);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::ModuleError;
use crate::modules::module::{Capabilities, Health, Module, ModuleRef};

type LifecycleFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), ModuleError>> + Send + Sync>;
type HealthFn = Box<dyn Fn() -> BoxFuture<'static, Result<Health, ModuleError>> + Send + Sync>;

/// Function-backed module with optional capabilities.
#[derive(Default)]
pub struct ModuleFn {
    start: Option<LifecycleFn>,
    stop: Option<LifecycleFn>,
    health: Option<HealthFn>,
}

impl ModuleFn {
    /// Creates a module with no capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start callback.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        self.start = Some(Box::new(move || Box::pin(f())));
        self
    }

    /// Sets the stop callback.
    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        self.stop = Some(Box::new(move || Box::pin(f())));
        self
    }

    /// Sets the health-check callback.
    pub fn on_health<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Health, ModuleError>> + Send + 'static,
    {
        self.health = Some(Box::new(move || Box::pin(f())));
        self
    }

    /// Wraps the module into a shared handle.
    pub fn arc(self) -> ModuleRef {
        Arc::new(self)
    }
}

#[async_trait]
impl Module for ModuleFn {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            start: self.start.is_some(),
            stop: self.stop.is_some(),
            health_check: self.health.is_some(),
        }
    }

    async fn start(&self) -> Result<(), ModuleError> {
        match &self.start {
            Some(f) => f().await,
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        match &self.stop {
            Some(f) => f().await,
            None => Ok(()),
        }
    }

    async fn health_check(&self) -> Result<Health, ModuleError> {
        match &self.health {
            Some(f) => f().await,
            None => Ok(Health::healthy()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn capabilities_follow_callbacks() {
        assert_eq!(ModuleFn::new().capabilities(), Capabilities::NONE);

        let m = ModuleFn::new()
            .on_start(|| async { Ok(()) })
            .on_stop(|| async { Ok(()) });
        assert_eq!(m.capabilities(), Capabilities::LIFECYCLE);

        let m = m.on_health(|| async { Ok(Health::healthy()) });
        assert_eq!(m.capabilities(), Capabilities::ALL);
    }

    #[tokio::test]
    async fn each_call_builds_a_fresh_future() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let m = ModuleFn::new().on_start(move || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ModuleError::startup("cold"))
                } else {
                    Ok(())
                }
            }
        });

        assert_eq!(m.start().await, Err(ModuleError::startup("cold")));
        assert_eq!(m.start().await, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_callbacks_are_noops() {
        let m = ModuleFn::new();
        assert_eq!(m.start().await, Ok(()));
        assert_eq!(m.stop().await, Ok(()));
    }
}
