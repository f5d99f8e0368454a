//! # Periodic health supervision.
//!
//! ```text
//! spawn(orch) ──► loop {
//!     select! (biased) {
//!         token.cancelled() ─► exit
//!         tick (every health_interval, first after one period)
//!             └─► catch_unwind(orch.check_all_health())
//!                   ├─ Ok(report) ─► debug!(healthy, total)
//!                   └─ panic      ─► error! + HealthCycleFailed, continue
//!     }
//! }
//! ```
//!
//! Cancellation is observed between cycles; a cycle in flight runs to completion.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::core::orchestrator::Orchestrator;
use crate::core::status::HealthReport;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;

/// Handle to the background health loop.
pub struct HealthMonitor {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawns the loop. Must be called inside a tokio runtime.
    pub fn spawn(orch: Arc<Orchestrator>) -> Self {
        let period = orch.config().health_interval;
        let bus = orch.bus().clone();
        Self::spawn_with(period, bus, move || {
            let orch = Arc::clone(&orch);
            async move { orch.check_all_health().await }
        })
    }

    /// Spawns the loop around an arbitrary health cycle.
    pub(crate) fn spawn_with<F, Fut>(period: Duration, bus: Bus, cycle: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = HealthReport> + Send + 'static,
    {
        let token = CancellationToken::new();
        let join = tokio::spawn(run(period, bus, token.clone(), cycle));
        Self { token, join }
    }

    /// Token that stops the loop when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancels the loop and waits for the current cycle to finish.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}

async fn run<F, Fut>(period: Duration, bus: Bus, token: CancellationToken, mut cycle: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HealthReport>,
{
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match AssertUnwindSafe(cycle()).catch_unwind().await {
            Ok(report) => {
                let healthy = report.values().filter(|h| h.healthy).count();
                debug!(healthy, total = report.len(), "health cycle complete");
            }
            Err(panic) => {
                let info = panic_message(panic.as_ref());
                error!(panic = %info, "health cycle failed");
                bus.publish(Event::new(EventKind::HealthCycleFailed).with_reason(info));
            }
        }
    }
    debug!("health monitor stopped");
}
