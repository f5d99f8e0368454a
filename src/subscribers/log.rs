//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [registered] module=db
//! [starting] module=db
//! [start-failed] module=db err="startup failed: connection refused"
//! [recovery] module=db attempt=1 delay=2s
//! [exhausted] module=db attempts=3
//! [stopped] module=db
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Stdout logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production use:
/// implement a custom [`Subscribe`] for structured logging or metrics.
#[derive(Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        if let Some(line) = render(e) {
            println!("{line}");
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}

fn render(e: &Event) -> Option<String> {
    let module = e.module.as_deref().unwrap_or("-");
    let reason = e.reason.as_deref().unwrap_or("");
    let line = match e.kind {
        EventKind::ModuleRegistered => format!("[registered] module={module} {reason}"),
        EventKind::ModuleStarting => format!("[starting] module={module}"),
        EventKind::ModuleStarted => format!("[running] module={module}"),
        EventKind::ModuleStartFailed => format!("[start-failed] module={module} err={reason:?}"),
        EventKind::ModuleStopped => format!("[stopped] module={module}"),
        EventKind::ModuleStopFailed => format!("[stop-failed] module={module} err={reason:?}"),
        EventKind::ModuleRestartRequested => format!("[restart] module={module}"),
        EventKind::ModuleUnhealthy => format!("[unhealthy] module={module} detail={reason:?}"),
        EventKind::RecoveryScheduled => format!(
            "[recovery] module={module} attempt={} delay={:?}",
            e.attempt.unwrap_or_default(),
            e.delay().unwrap_or_default()
        ),
        EventKind::RecoveryExhausted => format!(
            "[exhausted] module={module} attempts={}",
            e.attempt.unwrap_or_default()
        ),
        EventKind::ShutdownRequested => "[shutdown-requested]".to_string(),
        EventKind::HealthCycleFailed => format!("[health-cycle-failed] panic={reason:?}"),
        EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => return None,
    };
    Some(line.trim_end().to_string())
}
