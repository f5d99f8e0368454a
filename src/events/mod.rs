//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Orchestrator` (lifecycle, health, recovery), `HealthMonitor`
//!   (failed cycles), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener (fans out to `SubscriberSet`) and any
//!   receiver obtained through `Orchestrator::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
