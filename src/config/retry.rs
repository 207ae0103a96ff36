use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Exponential backoff applied after retryable fetch failures
///
/// The n-th consecutive failure waits roughly
/// `min(initial × multiplier^n, max)`, spread by `randomization_factor`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// First retry delay (unit: milliseconds)
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Growth factor applied after each consecutive failure
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter: the delay is drawn from `[d - f·d, d + f·d]`. Zero disables it.
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,

    /// Upper bound for the un-jittered delay (unit: milliseconds)
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

impl BackoffPolicy {
    /// Policy with the given first delay and default growth settings
    ///
    /// The delay is rounded up to whole milliseconds, with a floor of 1 ms.
    pub fn with_initial_interval(initial: Duration) -> Self {
        let millis = initial.as_nanos().div_ceil(1_000_000).clamp(1, u64::MAX as u128) as u64;
        let defaults = Self::default();
        Self {
            initial_interval_ms: millis,
            max_interval_ms: defaults.max_interval_ms.max(millis),
            ..defaults
        }
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_interval_ms == 0 {
            return Err(Error::InvalidConfig("retry.initial_interval_ms must be greater than 0".into()));
        }

        // Delays must grow between consecutive failures.
        if !(self.multiplier > 1.0) || !self.multiplier.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "retry.multiplier must be a finite value greater than 1.0, got {}",
                self.multiplier
            )));
        }

        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(Error::InvalidConfig(format!(
                "retry.randomization_factor must be within [0, 1], got {}",
                self.randomization_factor
            )));
        }

        if self.max_interval_ms < self.initial_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "retry.max_interval_ms ({}) must be >= initial_interval_ms ({})",
                self.max_interval_ms, self.initial_interval_ms
            )));
        }

        Ok(())
    }
}

fn default_initial_interval_ms() -> u64 {
    500
}
fn default_multiplier() -> f64 {
    1.5
}
fn default_randomization_factor() -> f64 {
    0.5
}
fn default_max_interval_ms() -> u64 {
    60_000
}
