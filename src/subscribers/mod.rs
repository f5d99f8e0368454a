//! # Event subscribers.
//!
//! ```text
//!   Orchestrator ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                  ┌─────────┼─────────┐
//!                                                                  ▼         ▼         ▼
//!                                                               worker1   worker2   workerN
//!                                                                  ▼         ▼         ▼
//!                                                               on_event  on_event  on_event
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use nodevisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::RecoveryExhausted {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "alerts"
//!     }
//! }
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;

pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
