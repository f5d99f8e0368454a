//! # Orchestrator configuration.
//!
//! Provides [`Config`], the centralized settings for the orchestrator, the
//! recovery policy and the health supervisor loop.
//!
//! Config can be built in code (`Config::default()` + field overrides) or
//! loaded from TOML with [`Config::from_toml_str`]:
//!
//! ```toml
//! max_recovery_attempts = 3
//! recovery_window_secs = 300
//! backoff_first_ms = 1000
//! backoff_factor = 2.0
//! backoff_max_secs = 300
//! restart_delay_ms = 1000
//! health_interval_secs = 30
//! health_timeout_ms = 5000
//! start_timeout_ms = 0
//! stop_timeout_ms = 0
//! bus_capacity = 1024
//! ```
//!
//! ## Sentinel values
//! - `health_timeout = 0s` → health probes are not bounded
//! - `start_timeout = 0s` / `stop_timeout = 0s` → module calls are not bounded

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::RecoveryPolicy;

/// Global configuration for the orchestrator.
///
/// ## Field semantics
/// - `recovery`: attempt budget, sliding window and backoff for automatic recovery
/// - `restart_delay`: fixed pause between stop and start of a manual restart
/// - `health_interval`: period of the health supervisor loop
/// - `health_timeout`: bound on a single health probe (`0s` = unbounded)
/// - `start_timeout` / `stop_timeout`: bounds on module calls (`0s` = unbounded)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Automatic recovery policy.
    pub recovery: RecoveryPolicy,
    /// Pause between stop and start in `restart_module`.
    pub restart_delay: Duration,
    /// Period of the health supervisor loop.
    pub health_interval: Duration,
    /// Per-probe health check timeout.
    pub health_timeout: Duration,
    /// Per-call start timeout.
    pub start_timeout: Duration,
    /// Per-call stop timeout.
    pub stop_timeout: Duration,
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl Config {
    /// Health probe bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn health_timeout(&self) -> Option<Duration> {
        non_zero(self.health_timeout)
    }

    /// Start call bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn start_timeout(&self) -> Option<Duration> {
        non_zero(self.start_timeout)
    }

    /// Stop call bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn stop_timeout(&self) -> Option<Duration> {
        non_zero(self.stop_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Parses a TOML document. Omitted keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        file.into_config()
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recovery.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "max_recovery_attempts",
                reason: "must be at least 1",
            });
        }
        if self.recovery.window.is_zero() {
            return Err(ConfigError::Invalid {
                key: "recovery_window_secs",
                reason: "must be greater than zero",
            });
        }
        if !(self.recovery.backoff.factor >= 1.0 && self.recovery.backoff.factor.is_finite()) {
            return Err(ConfigError::Invalid {
                key: "backoff_factor",
                reason: "must be a finite number >= 1.0",
            });
        }
        if self.health_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "health_interval_secs",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `recovery = RecoveryPolicy::default()` (3 attempts / 300s, backoff 2s, 4s, 8s...)
    /// - `restart_delay = 1s`
    /// - `health_interval = 30s`
    /// - `health_timeout = 5s`
    /// - `start_timeout = 0s`, `stop_timeout = 0s` (unbounded)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            recovery: RecoveryPolicy::default(),
            restart_delay: Duration::from_secs(1),
            health_interval: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
            start_timeout: Duration::ZERO,
            stop_timeout: Duration::ZERO,
            bus_capacity: 1024,
        }
    }
}

#[inline]
fn non_zero(d: Duration) -> Option<Duration> {
    if d.is_zero() {
        None
    } else {
        Some(d)
    }
}

/// On-disk shape of [`Config`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    max_recovery_attempts: Option<u32>,
    recovery_window_secs: Option<u64>,
    backoff_first_ms: Option<u64>,
    backoff_factor: Option<f64>,
    backoff_max_secs: Option<u64>,
    restart_delay_ms: Option<u64>,
    health_interval_secs: Option<u64>,
    health_timeout_ms: Option<u64>,
    start_timeout_ms: Option<u64>,
    stop_timeout_ms: Option<u64>,
    bus_capacity: Option<usize>,
}

impl ConfigFile {
    fn into_config(self) -> Result<Config, ConfigError> {
        let mut cfg = Config::default();
        let backoff = &mut cfg.recovery.backoff;

        if let Some(v) = self.backoff_first_ms {
            backoff.first = Duration::from_millis(v);
        }
        if let Some(v) = self.backoff_factor {
            backoff.factor = v;
        }
        if let Some(v) = self.backoff_max_secs {
            backoff.max = Duration::from_secs(v);
        }
        if let Some(v) = self.max_recovery_attempts {
            cfg.recovery.max_attempts = v;
        }
        if let Some(v) = self.recovery_window_secs {
            cfg.recovery.window = Duration::from_secs(v);
        }
        if let Some(v) = self.restart_delay_ms {
            cfg.restart_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.health_interval_secs {
            cfg.health_interval = Duration::from_secs(v);
        }
        if let Some(v) = self.health_timeout_ms {
            cfg.health_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.start_timeout_ms {
            cfg.start_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.stop_timeout_ms {
            cfg.stop_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.bus_capacity {
            cfg.bus_capacity = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
