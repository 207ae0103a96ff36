use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::BackoffPolicy;

/// Floor for the first delay; a zero interval would never grow.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Exponential backoff with jitter
///
/// Each call to [`next_backoff`](Self::next_backoff) returns the current
/// interval (jittered) and then grows it by `multiplier`, never past
/// `max_interval`. [`reset`](Self::reset) goes back to the initial interval.
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
    current_interval: Duration,
    rng: StdRng,
}

impl ExponentialBackoff {
    pub fn new(policy: &BackoffPolicy) -> Self {
        let initial_interval = policy.initial_interval().max(MIN_INTERVAL);
        Self {
            initial_interval,
            max_interval: policy.max_interval().max(initial_interval),
            multiplier: policy.multiplier,
            randomization_factor: policy.randomization_factor.clamp(0.0, 1.0),
            current_interval: initial_interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Delay to sleep before the next attempt
    ///
    /// Jitter is applied per call, so two consecutive delays may overlap; the
    /// un-jittered [`current_interval`](Self::current_interval) always grows
    /// until it reaches the cap.
    pub fn next_backoff(&mut self) -> Duration {
        let delay = self.jittered(self.current_interval);
        self.current_interval = self.grow(self.current_interval);
        delay
    }

    /// Forget consecutive failures
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
    }

    /// Un-jittered interval the next failure will be based on
    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    fn grow(
        &self,
        interval: Duration,
    ) -> Duration {
        let next = (interval.as_nanos() as f64 * self.multiplier).round();
        if !next.is_finite() || next >= self.max_interval.as_nanos() as f64 {
            self.max_interval
        } else {
            Duration::from_nanos(next as u64)
        }
    }

    fn jittered(
        &mut self,
        interval: Duration,
    ) -> Duration {
        let base = interval.as_nanos() as f64;
        let delta = base * self.randomization_factor;
        if delta < 1.0 {
            return interval;
        }
        let jittered = self.rng.gen_range((base - delta)..=(base + delta));
        Duration::from_nanos(jittered.round() as u64)
    }
}
