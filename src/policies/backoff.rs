//! # Backoff policy for automatic recovery.
//!
//! [`BackoffPolicy`] controls how long recovery waits between stopping a
//! failed module and starting it again. It is parameterized by:
//! - [`BackoffPolicy::first`] the base delay;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` is `first × factor^n`, clamped to `max`. Attempts
//! are numbered from 1, so the default policy (`first = 1s`, `factor = 2.0`)
//! yields 2s, 4s, 8s, ...
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use nodevisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::default();
//!
//! assert_eq!(backoff.next(1), Duration::from_secs(2));
//! assert_eq!(backoff.next(2), Duration::from_secs(4));
//! assert_eq!(backoff.next(3), Duration::from_secs(8));
//! ```

use std::time::Duration;

/// Recovery backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Base delay (`factor^0` multiple).
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0`).
    pub factor: f64,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `first = 1s`;
    /// - `factor = 2.0` (doubling);
    /// - `max = 300s` (one recovery window).
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(300),
            factor: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before recovery attempt `attempt`.
    ///
    /// The delay is `first × factor^attempt`, clamped to [`BackoffPolicy::max`].
    /// Non-finite or negative intermediate values clamp to `max` as well.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }

    /// Total time spent waiting across attempts `1..=attempts`.
    pub fn total(&self, attempts: u32) -> Duration {
        (1..=attempts).map(|n| self.next(n)).sum()
    }
}
