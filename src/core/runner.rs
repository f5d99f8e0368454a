//! # Bounded, panic-contained module calls.
//!
//! Every call into module code goes through this file:
//! - the call is skipped when the capability is absent (`start`/`stop` → `Ok`);
//! - an optional timeout wraps it (`tokio::time::timeout`);
//! - a panic is caught and turned into the [`ModuleError`] of that operation.
//!
//! ```text
//! run_start(handle) ──► caps.start? ──no──► Ok(())
//!                          │yes
//!                          ▼
//!                 timeout(catch_unwind(module.start()))
//!                    ├─ Ok(r)         ─► r
//!                    ├─ panic         ─► ModuleError::Startup
//!                    └─ elapsed       ─► ModuleError::Timeout{ "start" }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::core::registry::ModuleHandle;
use crate::error::ModuleError;
use crate::modules::Health;
use crate::subscribers::panic_message;

pub(crate) async fn run_start(
    handle: &ModuleHandle,
    timeout: Option<Duration>,
) -> Result<(), ModuleError> {
    if !handle.caps.start {
        return Ok(());
    }
    guarded("start", handle.module.start(), timeout, ModuleError::startup).await
}

pub(crate) async fn run_stop(
    handle: &ModuleHandle,
    timeout: Option<Duration>,
) -> Result<(), ModuleError> {
    if !handle.caps.stop {
        return Ok(());
    }
    guarded("stop", handle.module.stop(), timeout, ModuleError::shutdown).await
}

/// Calls the module's health check. Callers check `caps.health_check` first.
pub(crate) async fn run_probe(
    handle: &ModuleHandle,
    timeout: Option<Duration>,
) -> Result<Health, ModuleError> {
    guarded(
        "health_check",
        handle.module.health_check(),
        timeout,
        ModuleError::health_check,
    )
    .await
}

async fn guarded<T, F>(
    operation: &'static str,
    fut: F,
    timeout: Option<Duration>,
    on_panic: fn(String) -> ModuleError,
) -> Result<T, ModuleError>
where
    F: Future<Output = Result<T, ModuleError>>,
{
    let contained = async {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(on_panic(format!(
                "panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    };

    match timeout {
        Some(dur) => time::timeout(dur, contained)
            .await
            .unwrap_or(Err(ModuleError::Timeout {
                operation,
                timeout: dur,
            })),
        None => contained.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use crate::modules::{Capabilities, Module, ModuleFn, ModuleRef};

    struct Exploding;

    #[async_trait::async_trait]
    impl Module for Exploding {
        async fn start(&self) -> Result<(), ModuleError> {
            panic!("bad wiring")
        }
    }

    fn handle(module: ModuleRef) -> ModuleHandle {
        ModuleHandle {
            name: "m".into(),
            caps: module.capabilities(),
            module,
            seq: 1,
            op_lock: Arc::new(Mutex::new(())),
        }
    }

    #[tokio::test]
    async fn panics_become_module_errors() {
        let h = handle(Arc::new(Exploding));
        let err = run_start(&h, None).await.unwrap_err();
        assert_eq!(err, ModuleError::startup("panicked: bad wiring"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out() {
        let h = handle(
            ModuleFn::new()
                .on_health(|| async {
                    time::sleep(Duration::from_secs(60)).await;
                    Ok(Health::healthy())
                })
                .arc(),
        );
        let err = run_probe(&h, Some(Duration::from_secs(5))).await.unwrap_err();
        assert_eq!(
            err,
            ModuleError::Timeout {
                operation: "health_check",
                timeout: Duration::from_secs(5)
            }
        );
    }

    #[tokio::test]
    async fn absent_capabilities_are_skipped() {
        let h = handle(ModuleFn::new().arc());
        assert_eq!(h.caps, Capabilities::NONE);
        assert_eq!(run_start(&h, None).await, Ok(()));
        assert_eq!(run_stop(&h, None).await, Ok(()));
    }
}
