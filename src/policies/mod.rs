//! Recovery policies.
//!
//! This module groups the knobs that control **if** a failed module is
//! restarted automatically and **how long** to wait before doing so.
//!
//! ## Contents
//! - [`RecoveryPolicy`] attempt budget per sliding window + backoff schedule
//! - [`RecoveryWindow`] per-module history of recent attempts
//! - [`BackoffPolicy`]  how recovery delays evolve (first / factor / max)
//!
//! ## Quick wiring
//! ```text
//! Orchestrator::attempt_recovery(name)
//!      └─► RecoveryPolicy::admit(&mut record.recovery, now)
//!           ├─ Exhausted          ─► status = permanently_failed
//!           └─ Retry{attempt, delay}
//!                 └─► stop ─► sleep(delay, cancellable) ─► start
//! ```
//!
//! ## Defaults
//! - `max_attempts = 3`, `window = 300s`.
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=300s (2s, 4s, 8s, ...).

mod backoff;
mod recovery;

pub use backoff::BackoffPolicy;
pub use recovery::{RecoveryDecision, RecoveryPolicy, RecoveryWindow};
