//! # Recovery policy and per-module attempt window.
//!
//! [`RecoveryPolicy`] decides whether a failed module gets another restart.
//! Attempts are bounded by a **time window**, not a lifetime count: a module
//! that fails once an hour recovers indefinitely, while one that crash-loops
//! inside the window is declared permanently failed after
//! [`RecoveryPolicy::max_attempts`] tries.
//!
//! ## Decision order
//! ```text
//! admit(window, now)
//!   ├─► prune entries older than `window` (relative to now)
//!   ├─► count >= max_attempts ─► Exhausted
//!   └─► append now ─► Retry { attempt = count + 1, delay = backoff.next(attempt) }
//! ```
//!
//! Timestamps are [`tokio::time::Instant`], so a paused test clock drives the
//! window as well as the backoff sleeps.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::policies::backoff::BackoffPolicy;

/// Outcome of [`RecoveryPolicy::admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Try again after `delay`; `attempt` is 1-based within the window.
    Retry { attempt: u32, delay: Duration },
    /// Budget spent; `attempts` were counted inside the window.
    Exhausted { attempts: usize },
}

/// Recent recovery attempts of one module.
#[derive(Clone, Debug, Default)]
pub struct RecoveryWindow {
    attempts: VecDeque<Instant>,
}

impl RecoveryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops attempts that are `window` old or older; returns what is left.
    pub fn prune(&mut self, now: Instant, window: Duration) -> usize {
        while let Some(front) = self.attempts.front() {
            if now.saturating_duration_since(*front) >= window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
        self.attempts.len()
    }

    /// Counts attempts younger than `window` without mutating the history.
    pub fn recent(&self, now: Instant, window: Duration) -> usize {
        self.attempts
            .iter()
            .filter(|at| now.saturating_duration_since(**at) < window)
            .count()
    }

    /// Appends an attempt; returns the new length.
    pub fn record(&mut self, now: Instant) -> usize {
        self.attempts.push_back(now);
        self.attempts.len()
    }

    pub fn clear(&mut self) {
        self.attempts.clear();
    }

    /// Stored attempts, including ones not pruned yet.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// Policy bounding automatic recovery.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecoveryPolicy {
    /// Attempts allowed inside one window before giving up.
    pub max_attempts: u32,
    /// Sliding window attempts are counted in.
    pub window: Duration,
    /// Delay schedule between stop and start of a recovery.
    pub backoff: BackoffPolicy,
}

impl Default for RecoveryPolicy {
    /// `max_attempts = 3`, `window = 300s`, default [`BackoffPolicy`].
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window: Duration::from_secs(300),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RecoveryPolicy {
    /// Prunes, checks, then appends (in that order) and returns the decision.
    pub fn admit(&self, history: &mut RecoveryWindow, now: Instant) -> RecoveryDecision {
        let recent = history.prune(now, self.window);
        if recent >= self.max_attempts as usize {
            return RecoveryDecision::Exhausted { attempts: recent };
        }

        let attempt = history.record(now) as u32;
        RecoveryDecision::Retry {
            attempt,
            delay: self.backoff.next(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy::default()
    }

    #[test]
    fn test_admits_until_budget_spent() {
        let p = policy();
        let mut w = RecoveryWindow::new();
        let t0 = Instant::now();

        assert_eq!(
            p.admit(&mut w, t0),
            RecoveryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            p.admit(&mut w, t0 + Duration::from_secs(10)),
            RecoveryDecision::Retry {
                attempt: 2,
                delay: Duration::from_secs(4)
            }
        );
        assert_eq!(
            p.admit(&mut w, t0 + Duration::from_secs(20)),
            RecoveryDecision::Retry {
                attempt: 3,
                delay: Duration::from_secs(8)
            }
        );
        assert_eq!(
            p.admit(&mut w, t0 + Duration::from_secs(30)),
            RecoveryDecision::Exhausted { attempts: 3 }
        );
        // A rejected attempt is not recorded.
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn test_window_forgets_old_attempts() {
        let p = policy();
        let mut w = RecoveryWindow::new();
        let t0 = Instant::now();

        for i in 0..3 {
            p.admit(&mut w, t0 + Duration::from_secs(i));
        }
        let later = t0 + Duration::from_secs(301);
        assert_eq!(
            p.admit(&mut w, later),
            RecoveryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_partial_expiry_frees_one_slot() {
        let p = policy();
        let mut w = RecoveryWindow::new();
        let t0 = Instant::now();

        p.admit(&mut w, t0);
        p.admit(&mut w, t0 + Duration::from_secs(100));
        p.admit(&mut w, t0 + Duration::from_secs(200));

        let decision = p.admit(&mut w, t0 + Duration::from_secs(300));
        assert_eq!(
            decision,
            RecoveryDecision::Retry {
                attempt: 3,
                delay: Duration::from_secs(8)
            }
        );
    }

    #[test]
    fn test_recent_does_not_mutate() {
        let mut w = RecoveryWindow::new();
        let t0 = Instant::now();
        w.record(t0);
        w.record(t0 + Duration::from_secs(250));

        let window = Duration::from_secs(300);
        assert_eq!(w.recent(t0 + Duration::from_secs(310), window), 1);
        assert_eq!(w.len(), 2);
        assert_eq!(w.prune(t0 + Duration::from_secs(310), window), 1);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_zero_budget_is_always_exhausted() {
        let p = RecoveryPolicy {
            max_attempts: 0,
            ..policy()
        };
        let mut w = RecoveryWindow::new();
        assert_eq!(
            p.admit(&mut w, Instant::now()),
            RecoveryDecision::Exhausted { attempts: 0 }
        );
        assert!(w.is_empty());
    }
}
