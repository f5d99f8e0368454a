//! # Runtime events emitted by the orchestrator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: registration, start, stop of a module
//! - **Health events**: unhealthy verdicts and failed supervisor cycles
//! - **Recovery events**: scheduled retries and exhausted budgets
//! - **Runtime events**: shutdown requests and subscriber trouble
//!
//! The [`Event`] struct carries metadata such as timestamps, module name,
//! reasons, attempt numbers and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use nodevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RecoveryScheduled)
//!     .with_module("db")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(4));
//!
//! assert_eq!(ev.kind, EventKind::RecoveryScheduled);
//! assert_eq!(ev.module.as_deref(), Some("db"));
//! assert_eq!(ev.delay(), Some(Duration::from_secs(4)));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `module`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `module`: subscriber name
    /// - `reason`: `"full"` or `"closed"`
    SubscriberOverflow,

    // === Runtime events ===
    /// Shutdown requested (OS signal observed or `stop_all` called).
    ShutdownRequested,

    /// A health supervisor cycle panicked; the loop keeps running.
    ///
    /// Sets:
    /// - `reason`: panic message
    HealthCycleFailed,

    // === Module lifecycle events ===
    /// Module inserted (or replaced) in the registry.
    ///
    /// Sets:
    /// - `module`: module name
    /// - `reason`: `"replaced"` when an existing record was overwritten
    ModuleRegistered,

    /// Module start attempt begins.
    ModuleStarting,

    /// Module is running.
    ModuleStarted,

    /// Module start failed.
    ///
    /// Sets:
    /// - `module`: module name
    /// - `reason`: error message
    ModuleStartFailed,

    /// Module stopped cleanly.
    ModuleStopped,

    /// Module stop failed (non-fatal).
    ///
    /// Sets:
    /// - `module`: module name
    /// - `reason`: error message
    ModuleStopFailed,

    /// Manual restart requested.
    ModuleRestartRequested,

    // === Health & recovery events ===
    /// Health probe reported the module unhealthy (or failed).
    ///
    /// Sets:
    /// - `module`: module name
    /// - `reason`: probe detail or error
    ModuleUnhealthy,

    /// Recovery admitted; the module will be restarted after `delay_ms`.
    ///
    /// Sets:
    /// - `module`: module name
    /// - `attempt`: attempt number inside the window (1-based)
    /// - `delay_ms`: backoff before the start call
    RecoveryScheduled,

    /// Recovery budget spent; module is now permanently failed.
    ///
    /// Sets:
    /// - `module`: module name
    /// - `attempt`: attempts counted inside the window
    RecoveryExhausted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the module, if applicable.
    pub module: Option<Arc<str>>,
    /// Human-readable reason (errors, details, overflow cause).
    pub reason: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            module: None,
            reason: None,
            attempt: None,
            delay_ms: None,
        }
    }

    /// Attaches a module name.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Backoff delay, if set.
    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_module(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_module(subscriber)
            .with_reason(info)
    }

    /// True for the module name `name`.
    #[inline]
    pub fn is_for(&self, name: &str) -> bool {
        self.module.as_deref() == Some(name)
    }
}
